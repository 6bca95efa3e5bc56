use std::sync::Arc;

use qrseal_core::ServiceError;
use qrseal_sql::{SQLStore, Value};

use super::map_sql_err;

/// First serial ever handed out for a fresh scope.
pub const SERIAL_BASE: i64 = 1000;

/// SQL schema for the sequences table. `value` is the next unallocated
/// serial for the scope.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sequences (
        scope TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    )",
];

/// Serial-number allocator — one monotonically increasing counter per
/// (state, OEM) scope.
///
/// Allocation is a single atomic upsert; two concurrent batch requests
/// for the same scope serialize on that one statement, never at the
/// application layer. Ranges are never returned to the pool: a failed
/// batch leaves a gap, and a serial is never reissued for another code.
pub struct SequenceStore {
    db: Arc<dyn SQLStore>,
}

impl SequenceStore {
    /// Create the store and initialise its schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        for stmt in SCHEMA {
            db.exec(stmt, &[]).map_err(map_sql_err)?;
        }
        Ok(Self { db })
    }

    /// Atomically reserve `quantity` serials for a scope and return the
    /// first one. The reserved range is `[start, start + quantity)`.
    pub fn allocate(&self, scope_key: &str, quantity: u32) -> Result<i64, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::Validation(
                "cannot allocate zero serials".into(),
            ));
        }

        let rows = self
            .db
            .query(
                "INSERT INTO sequences (scope, value) VALUES (?1, ?2 + ?3) \
                 ON CONFLICT(scope) DO UPDATE SET value = value + ?3 \
                 RETURNING value - ?3 AS start",
                &[
                    Value::Text(scope_key.to_string()),
                    Value::Integer(SERIAL_BASE),
                    Value::Integer(quantity as i64),
                ],
            )
            .map_err(map_sql_err)?;

        rows.first()
            .and_then(|r| r.get_i64("start"))
            .ok_or_else(|| ServiceError::Storage("sequence upsert returned no row".into()))
    }

    /// The next unallocated serial for a scope, if the scope exists yet.
    pub fn current(&self, scope_key: &str) -> Result<Option<i64>, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT value FROM sequences WHERE scope = ?1",
                &[Value::Text(scope_key.to_string())],
            )
            .map_err(map_sql_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("value")))
    }
}
