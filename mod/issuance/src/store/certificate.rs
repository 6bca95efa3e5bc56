use std::sync::Arc;

use qrseal_core::ServiceError;
use qrseal_sql::{Row, SQLStore, TxStatement, Value};

use crate::model::Certificate;

use super::map_sql_err;

/// SQL schema for certificates. The UNIQUE index on `qr_id` is the
/// structural guarantee that a code never carries two certificates.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS certificates (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        number TEXT NOT NULL UNIQUE,
        qr_id TEXT NOT NULL UNIQUE,
        rto TEXT NOT NULL,
        create_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_cert_rto ON certificates(rto)",
];

/// Persistent storage for installation certificates.
pub struct CertificateStore {
    db: Arc<dyn SQLStore>,
}

impl CertificateStore {
    /// Create the store and initialise its schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        for stmt in SCHEMA {
            db.exec(stmt, &[]).map_err(map_sql_err)?;
        }
        Ok(Self { db })
    }

    /// Insert statement for one certificate, for use inside the issuance
    /// transaction alongside the code's UNUSED→USED flip.
    pub fn insert_statement(&self, cert: &Certificate) -> Result<TxStatement, ServiceError> {
        let data = serde_json::to_string(cert)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(TxStatement::new(
            "INSERT INTO certificates (id, data, number, qr_id, rto, create_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            vec![
                Value::Text(cert.id.clone()),
                Value::Text(data),
                Value::Text(cert.number.clone()),
                Value::Text(cert.qr_id.clone()),
                Value::Text(cert.rto.clone()),
                Value::Text(cert.create_at.clone()),
            ],
        ))
    }

    /// Delete statement for the certificate of a code, if one exists.
    /// Unguarded: reactivating a code whose certificate is already gone
    /// only needs the status flip.
    pub fn delete_by_qr_statement(&self, qr_id: &str) -> TxStatement {
        TxStatement::new(
            "DELETE FROM certificates WHERE qr_id = ?1",
            vec![Value::Text(qr_id.to_string())],
        )
    }

    /// Get a certificate by its number.
    pub fn get_by_number(&self, number: &str) -> Result<Certificate, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM certificates WHERE number = ?1",
                &[Value::Text(number.to_string())],
            )
            .map_err(map_sql_err)?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("certificate '{}'", number)))?;
        row_to_certificate(row)
    }

    /// The certificate bound to a code, if any.
    pub fn find_by_qr(&self, qr_id: &str) -> Result<Option<Certificate>, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM certificates WHERE qr_id = ?1",
                &[Value::Text(qr_id.to_string())],
            )
            .map_err(map_sql_err)?;

        rows.first().map(row_to_certificate).transpose()
    }
}

/// Deserialize a Certificate from a row's `data` JSON column.
fn row_to_certificate(row: &Row) -> Result<Certificate, ServiceError> {
    let json = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Storage("missing data column".into()))?;
    serde_json::from_str(json)
        .map_err(|e| ServiceError::Storage(format!("bad certificate json: {e}")))
}
