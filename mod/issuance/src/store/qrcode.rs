use std::sync::Arc;

use qrseal_core::{ServiceError, now_rfc3339};
use qrseal_sql::{Row, SQLStore, TxStatement, Value};

use crate::model::{QrCode, QrStatus};

use super::map_sql_err;

/// SQL schema for the code registry. Plain columns, no JSON document —
/// this is the hot table, and its status flips must be expressible as
/// single compare-and-swap statements.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS qr_codes (
        id TEXT PRIMARY KEY,
        batch_id TEXT NOT NULL,
        state TEXT NOT NULL,
        oem TEXT NOT NULL,
        product TEXT NOT NULL,
        serial INTEGER NOT NULL,
        value TEXT NOT NULL UNIQUE,
        payload TEXT NOT NULL,
        status INTEGER NOT NULL DEFAULT 0,
        create_at TEXT NOT NULL,
        update_at TEXT NOT NULL,
        UNIQUE(state, oem, product, serial)
    )",
    "CREATE INDEX IF NOT EXISTS idx_qr_batch ON qr_codes(batch_id)",
    "CREATE INDEX IF NOT EXISTS idx_qr_scope_serial ON qr_codes(state, oem, serial)",
    "CREATE INDEX IF NOT EXISTS idx_qr_status ON qr_codes(status)",
];

const COLUMNS: &str =
    "id, batch_id, state, oem, product, serial, value, payload, status, create_at, update_at";

/// The registry of issued codes: lookups, eligibility scans, and the
/// status-flip statements other components compose into transactions.
/// No business rules live here beyond uniqueness enforcement.
pub struct QrCodeStore {
    db: Arc<dyn SQLStore>,
}

impl QrCodeStore {
    /// Create the store and initialise its schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        for stmt in SCHEMA {
            db.exec(stmt, &[]).map_err(map_sql_err)?;
        }
        Ok(Self { db })
    }

    /// Insert statement for one code row, for use inside the batch
    /// completion transaction.
    pub fn insert_statement(&self, code: &QrCode) -> TxStatement {
        TxStatement::new(
            format!("INSERT INTO qr_codes ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            vec![
                Value::Text(code.id.clone()),
                Value::Text(code.batch_id.clone()),
                Value::Text(code.state.clone()),
                Value::Text(code.oem.clone()),
                Value::Text(code.product.clone()),
                Value::Integer(code.serial),
                Value::Text(code.value.clone()),
                Value::Text(code.payload.clone()),
                Value::Integer(code.status.as_i64()),
                Value::Text(code.create_at.clone()),
                Value::Text(code.update_at.clone()),
            ],
        )
    }

    /// Look up a code by its opaque value.
    pub fn find_by_value(&self, value: &str) -> Result<QrCode, ServiceError> {
        let rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM qr_codes WHERE value = ?1"),
                &[Value::Text(value.to_string())],
            )
            .map_err(map_sql_err)?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("QR code '{}'", value)))?;
        row_to_code(row)
    }

    /// Look up a code by (state, oem) scope and serial. Serials within one
    /// scope come from a single sequence, so this is unambiguous across
    /// products.
    pub fn find_by_serial(
        &self,
        state: &str,
        oem: &str,
        serial: i64,
    ) -> Result<QrCode, ServiceError> {
        let rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM qr_codes \
                     WHERE state = ?1 AND oem = ?2 AND serial = ?3"
                ),
                &[
                    Value::Text(state.to_string()),
                    Value::Text(oem.to_string()),
                    Value::Integer(serial),
                ],
            )
            .map_err(map_sql_err)?;

        let row = rows.first().ok_or_else(|| {
            ServiceError::NotFound(format!("serial {} in {}/{}", serial, state, oem))
        })?;
        row_to_code(row)
    }

    /// USED codes in a (state, oem, product) scope with serial ≥ `from`,
    /// in ascending serial order. Ghost regeneration eligibility.
    pub fn select_used_from(
        &self,
        state: &str,
        oem: &str,
        product: &str,
        from_serial: i64,
        limit: u32,
    ) -> Result<Vec<QrCode>, ServiceError> {
        let rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM qr_codes \
                     WHERE state = ?1 AND oem = ?2 AND product = ?3 \
                       AND serial >= ?4 AND status = 1 \
                     ORDER BY serial ASC LIMIT ?5"
                ),
                &[
                    Value::Text(state.to_string()),
                    Value::Text(oem.to_string()),
                    Value::Text(product.to_string()),
                    Value::Integer(from_serial),
                    Value::Integer(limit as i64),
                ],
            )
            .map_err(map_sql_err)?;

        rows.iter().map(row_to_code).collect()
    }

    /// Codes matching the given serials within a (state, oem) scope,
    /// ordered by (state, oem, product, serial) for deterministic sheet
    /// layout. Bulk replacement selection.
    pub fn select_by_serials(
        &self,
        state: &str,
        oem: &str,
        serials: &[i64],
    ) -> Result<Vec<QrCode>, ServiceError> {
        if serials.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (0..serials.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "SELECT {COLUMNS} FROM qr_codes \
             WHERE state = ?1 AND oem = ?2 AND serial IN ({}) \
             ORDER BY state, oem, product, serial",
            placeholders.join(", ")
        );

        let mut params = vec![Value::Text(state.to_string()), Value::Text(oem.to_string())];
        params.extend(serials.iter().map(|s| Value::Integer(*s)));

        let rows = self.db.query(&sql, &params).map_err(map_sql_err)?;
        rows.iter().map(row_to_code).collect()
    }

    /// Number of code rows belonging to a batch.
    pub fn count_for_batch(&self, batch_id: &str) -> Result<i64, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT COUNT(*) AS cnt FROM qr_codes WHERE batch_id = ?1",
                &[Value::Text(batch_id.to_string())],
            )
            .map_err(map_sql_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0))
    }

    /// Guarded UNUSED→USED flip. Affects zero rows if the code was
    /// already consumed, aborting the surrounding transaction.
    pub fn mark_used_statement(&self, id: &str) -> TxStatement {
        TxStatement::guarded(
            "UPDATE qr_codes SET status = 1, update_at = ?1 WHERE id = ?2 AND status = 0",
            vec![Value::Text(now_rfc3339()), Value::Text(id.to_string())],
        )
    }

    /// Guarded USED→UNUSED flip, reactivation only.
    pub fn mark_unused_statement(&self, id: &str) -> TxStatement {
        TxStatement::guarded(
            "UPDATE qr_codes SET status = 0, update_at = ?1 WHERE id = ?2 AND status = 1",
            vec![Value::Text(now_rfc3339()), Value::Text(id.to_string())],
        )
    }
}

/// Build a QrCode from a plain-column row.
fn row_to_code(row: &Row) -> Result<QrCode, ServiceError> {
    let get = |name: &str| -> Result<String, ServiceError> {
        row.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Storage(format!("missing column {name}")))
    };
    let get_int = |name: &str| -> Result<i64, ServiceError> {
        row.get_i64(name)
            .ok_or_else(|| ServiceError::Storage(format!("missing column {name}")))
    };

    Ok(QrCode {
        id: get("id")?,
        batch_id: get("batch_id")?,
        state: get("state")?,
        oem: get("oem")?,
        product: get("product")?,
        serial: get_int("serial")?,
        value: get("value")?,
        payload: get("payload")?,
        status: QrStatus::from_i64(get_int("status")?),
        create_at: get("create_at")?,
        update_at: get("update_at")?,
    })
}
