use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, TxStatement, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // Enable WAL mode for better concurrent read performance, and
        // enforce foreign keys for registry integrity.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::new();
            for (i, name) in column_names.iter().enumerate() {
                let val = row_value_at(row, i);
                columns.push((name.clone(), val));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| SQLError::Execution(e.to_string()))?;

    Ok(affected as u64)
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        run_exec(&conn, sql, params)
    }

    fn exec_tx(&self, stmts: &[TxStatement]) -> Result<Vec<u64>, SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let mut affected = Vec::with_capacity(stmts.len());
        for (i, stmt) in stmts.iter().enumerate() {
            // Dropping `tx` without commit rolls the transaction back.
            let n = run_exec(&tx, &stmt.sql, &stmt.params)?;
            if stmt.expect_rows && n == 0 {
                return Err(SQLError::Aborted(format!(
                    "statement {} affected no rows",
                    i
                )));
            }
            affected.push(n);
        }

        tx.commit()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        Ok(affected)
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    // Try integer first, then real, then text, then blob, then null.
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Value::Integer(i);
    }
    if let Ok(f) = row.get::<_, f64>(idx) {
        return Value::Real(f);
    }
    if let Ok(s) = row.get::<_, String>(idx) {
        return Value::Text(s);
    }
    if let Ok(b) = row.get::<_, Vec<u8>>(idx) {
        return Value::Blob(b);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE items (id TEXT PRIMARY KEY, n INTEGER NOT NULL)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn query_and_exec_roundtrip() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO items (id, n) VALUES (?1, ?2)",
                &[Value::Text("a".into()), Value::Integer(7)],
            )
            .unwrap();

        let rows = store
            .query("SELECT id, n FROM items", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("a"));
        assert_eq!(rows[0].get_i64("n"), Some(7));
    }

    #[test]
    fn returning_clause_works_through_query() {
        let store = store_with_table();
        let rows = store
            .query(
                "INSERT INTO items (id, n) VALUES (?1, 5) \
                 ON CONFLICT(id) DO UPDATE SET n = n + 5 RETURNING n",
                &[Value::Text("seq".into())],
            )
            .unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(5));

        let rows = store
            .query(
                "INSERT INTO items (id, n) VALUES (?1, 5) \
                 ON CONFLICT(id) DO UPDATE SET n = n + 5 RETURNING n",
                &[Value::Text("seq".into())],
            )
            .unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(10));
    }

    #[test]
    fn exec_tx_commits_all() {
        let store = store_with_table();
        let affected = store
            .exec_tx(&[
                TxStatement::new(
                    "INSERT INTO items (id, n) VALUES (?1, 1)",
                    vec![Value::Text("a".into())],
                ),
                TxStatement::new(
                    "INSERT INTO items (id, n) VALUES (?1, 2)",
                    vec![Value::Text("b".into())],
                ),
            ])
            .unwrap();
        assert_eq!(affected, vec![1, 1]);

        let rows = store.query("SELECT COUNT(*) AS cnt FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(2));
    }

    #[test]
    fn exec_tx_rolls_back_on_error() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO items (id, n) VALUES ('dup', 1)",
                &[],
            )
            .unwrap();

        // Second statement violates the primary key; first must not stick.
        let err = store.exec_tx(&[
            TxStatement::new(
                "INSERT INTO items (id, n) VALUES ('fresh', 1)",
                vec![],
            ),
            TxStatement::new(
                "INSERT INTO items (id, n) VALUES ('dup', 2)",
                vec![],
            ),
        ]);
        assert!(err.is_err());

        let rows = store
            .query("SELECT COUNT(*) AS cnt FROM items WHERE id = 'fresh'", &[])
            .unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn exec_tx_guard_aborts_on_zero_rows() {
        let store = store_with_table();
        store
            .exec("INSERT INTO items (id, n) VALUES ('x', 0)", &[])
            .unwrap();

        // The guarded CAS targets n = 99 which doesn't match; whole tx aborts.
        let err = store.exec_tx(&[
            TxStatement::guarded(
                "UPDATE items SET n = 1 WHERE id = 'x' AND n = 99",
                vec![],
            ),
            TxStatement::new("INSERT INTO items (id, n) VALUES ('y', 1)", vec![]),
        ]);
        assert!(matches!(err, Err(SQLError::Aborted(_))));

        let rows = store
            .query("SELECT COUNT(*) AS cnt FROM items WHERE id = 'y'", &[])
            .unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn unguarded_zero_rows_is_fine() {
        let store = store_with_table();
        let affected = store
            .exec_tx(&[
                TxStatement::new("DELETE FROM items WHERE id = 'absent'", vec![]),
                TxStatement::new("INSERT INTO items (id, n) VALUES ('z', 3)", vec![]),
            ])
            .unwrap();
        assert_eq!(affected, vec![0, 1]);
    }
}
