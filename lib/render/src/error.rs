use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}
