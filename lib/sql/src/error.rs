use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction was rolled back because a guarded statement affected
    /// no rows (see `TxStatement::expect_rows`).
    #[error("transaction aborted: {0}")]
    Aborted(String),
}
