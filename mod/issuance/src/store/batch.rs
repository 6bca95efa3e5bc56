use std::sync::Arc;

use qrseal_core::{ListParams, ListResult, ServiceError, now_rfc3339};
use qrseal_sql::{Row, SQLStore, TxStatement, Value};

use crate::model::{Batch, BatchKind, BatchStatus};

use super::map_sql_err;

/// SQL schema for the batches table. The full document lives in `data`;
/// the listed columns are extracted for filtering and uniqueness.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS batches (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        state TEXT NOT NULL,
        oem TEXT NOT NULL,
        product TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL,
        create_at TEXT NOT NULL,
        update_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_batch_status ON batches(status)",
    "CREATE INDEX IF NOT EXISTS idx_batch_scope ON batches(state, oem)",
    "CREATE INDEX IF NOT EXISTS idx_batch_kind ON batches(kind)",
];

/// Filters for batch listings. `include_ghost` defaults to false: ghost
/// batches stay invisible unless explicitly requested.
#[derive(Debug, Default)]
pub struct BatchFilters {
    pub state: Option<String>,
    pub oem: Option<String>,
    pub status: Option<String>,
    pub include_ghost: bool,
}

/// Persistent storage for batches.
///
/// This table doubles as the durable generation queue: PENDING rows are
/// claimable work, and all status transitions are compare-and-swap
/// updates so the PENDING→PROCESSING→{COMPLETED,FAILED} order can never
/// run backwards, regardless of how many workers race.
pub struct BatchStore {
    db: Arc<dyn SQLStore>,
}

impl BatchStore {
    /// Create the store and initialise its schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        for stmt in SCHEMA {
            db.exec(stmt, &[]).map_err(map_sql_err)?;
        }
        Ok(Self { db })
    }

    /// Insert a new batch. A duplicate code is a Conflict.
    pub fn create(&self, batch: &Batch) -> Result<(), ServiceError> {
        let data = serde_json::to_string(batch)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.db
            .exec(
                "INSERT INTO batches \
                 (id, data, code, state, oem, product, kind, status, create_at, update_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                &[
                    Value::Text(batch.id.clone()),
                    Value::Text(data),
                    Value::Text(batch.code.clone()),
                    Value::Text(batch.state.clone()),
                    Value::Text(batch.oem.clone()),
                    Value::Text(batch.product.clone()),
                    Value::Text(batch.kind.as_str().to_string()),
                    Value::Text(batch.status.as_str().to_string()),
                    Value::Text(batch.create_at.clone()),
                    Value::Text(batch.update_at.clone()),
                ],
            )
            .map_err(map_sql_err)?;

        Ok(())
    }

    /// Get a batch by its human-readable code.
    pub fn get_by_code(&self, code: &str) -> Result<Batch, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM batches WHERE code = ?1",
                &[Value::Text(code.to_string())],
            )
            .map_err(map_sql_err)?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("batch '{}'", code)))?;
        row_to_batch(row)
    }

    /// Whether a code is already taken.
    pub fn code_exists(&self, code: &str) -> Result<bool, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT COUNT(*) AS cnt FROM batches WHERE code = ?1",
                &[Value::Text(code.to_string())],
            )
            .map_err(map_sql_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) > 0)
    }

    /// List batches. Ghost batches are filtered out unless requested.
    pub fn list(
        &self,
        params: &ListParams,
        filters: &BatchFilters,
    ) -> Result<ListResult<Batch>, ServiceError> {
        let mut where_clauses: Vec<String> = Vec::new();
        let mut sql_params: Vec<Value> = Vec::new();
        let mut idx = 1;

        if !filters.include_ghost {
            where_clauses.push(format!("kind = ?{idx}"));
            sql_params.push(Value::Text(BatchKind::Live.as_str().to_string()));
            idx += 1;
        }
        if let Some(ref s) = filters.state {
            where_clauses.push(format!("state = ?{idx}"));
            sql_params.push(Value::Text(s.clone()));
            idx += 1;
        }
        if let Some(ref o) = filters.oem {
            where_clauses.push(format!("oem = ?{idx}"));
            sql_params.push(Value::Text(o.clone()));
            idx += 1;
        }
        if let Some(ref st) = filters.status {
            where_clauses.push(format!("status = ?{idx}"));
            sql_params.push(Value::Text(st.clone()));
            idx += 1;
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM batches {where_sql}");
        let count_rows = self.db.query(&count_sql, &sql_params).map_err(map_sql_err)?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let select_sql = format!(
            "SELECT data FROM batches {where_sql} ORDER BY create_at DESC LIMIT ?{idx} OFFSET ?{}",
            idx + 1
        );
        let mut select_params = sql_params;
        select_params.push(Value::Integer(params.limit.min(500) as i64));
        select_params.push(Value::Integer(params.offset as i64));

        let rows = self
            .db
            .query(&select_sql, &select_params)
            .map_err(map_sql_err)?;

        let items = rows
            .iter()
            .map(row_to_batch)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListResult { items, total })
    }

    /// Atomically claim the oldest PENDING batch by transitioning it to
    /// PROCESSING. Returns None when there is nothing to claim (or
    /// another worker claimed every candidate first).
    pub fn claim_next_pending(&self) -> Result<Option<Batch>, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM batches WHERE status = 'PENDING' \
                 ORDER BY create_at ASC LIMIT 5",
                &[],
            )
            .map_err(map_sql_err)?;

        for row in &rows {
            let mut batch = row_to_batch(row)?;
            batch.status = BatchStatus::Processing;
            batch.update_at = now_rfc3339();

            let data = serde_json::to_string(&batch)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;

            let affected = self
                .db
                .exec(
                    "UPDATE batches SET data = ?1, status = 'PROCESSING', update_at = ?2 \
                     WHERE id = ?3 AND status = 'PENDING'",
                    &[
                        Value::Text(data),
                        Value::Text(batch.update_at.clone()),
                        Value::Text(batch.id.clone()),
                    ],
                )
                .map_err(map_sql_err)?;

            if affected > 0 {
                return Ok(Some(batch));
            }
        }

        Ok(None)
    }

    /// Guarded statement finishing a batch: PROCESSING→COMPLETED with the
    /// final document (serial range, artifact). Joins the bulk code
    /// inserts in one transaction.
    pub fn completion_statement(&self, batch: &Batch) -> Result<TxStatement, ServiceError> {
        let data = serde_json::to_string(batch)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(TxStatement::guarded(
            "UPDATE batches SET data = ?1, status = 'COMPLETED', update_at = ?2 \
             WHERE id = ?3 AND status = 'PROCESSING'",
            vec![
                Value::Text(data),
                Value::Text(batch.update_at.clone()),
                Value::Text(batch.id.clone()),
            ],
        ))
    }

    /// Terminate a PROCESSING batch as FAILED, recording the error.
    /// Returns false if the batch was not in PROCESSING anymore.
    pub fn fail(&self, batch: &Batch) -> Result<bool, ServiceError> {
        let data = serde_json::to_string(batch)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let affected = self
            .db
            .exec(
                "UPDATE batches SET data = ?1, status = 'FAILED', update_at = ?2 \
                 WHERE id = ?3 AND status = 'PROCESSING'",
                &[
                    Value::Text(data),
                    Value::Text(batch.update_at.clone()),
                    Value::Text(batch.id.clone()),
                ],
            )
            .map_err(map_sql_err)?;

        Ok(affected > 0)
    }

    /// Batches stuck in PROCESSING since before `cutoff` (RFC 3339).
    /// Surfaced for operational alerting; never auto-recovered.
    pub fn stale_processing(&self, cutoff: &str) -> Result<Vec<Batch>, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM batches WHERE status = 'PROCESSING' AND update_at < ?1",
                &[Value::Text(cutoff.to_string())],
            )
            .map_err(map_sql_err)?;

        rows.iter().map(row_to_batch).collect()
    }
}

/// Deserialize a Batch from a row's `data` JSON column.
fn row_to_batch(row: &Row) -> Result<Batch, ServiceError> {
    let json = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Storage("missing data column".into()))?;
    serde_json::from_str(json)
        .map_err(|e| ServiceError::Storage(format!("bad batch json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_sql::SqliteStore;

    fn test_store() -> BatchStore {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        BatchStore::new(db).unwrap()
    }

    fn make_batch(code: &str, kind: BatchKind) -> Batch {
        let now = now_rfc3339();
        Batch {
            id: qrseal_core::new_id(),
            code: code.into(),
            state: "MH".into(),
            oem: "TATA".into(),
            product: "C3".into(),
            quantity: 3,
            kind,
            status: BatchStatus::Pending,
            start_serial: None,
            end_serial: None,
            artifact_url: None,
            error: None,
            ghost_from_serial: None,
            requested_by: None,
            create_at: now.clone(),
            update_at: now,
        }
    }

    #[test]
    fn create_and_get() {
        let store = test_store();
        store.create(&make_batch("A1B2C", BatchKind::Live)).unwrap();

        let got = store.get_by_code("A1B2C").unwrap();
        assert_eq!(got.status, BatchStatus::Pending);
        assert!(store.code_exists("A1B2C").unwrap());
        assert!(!store.code_exists("ZZZZZ").unwrap());
    }

    #[test]
    fn duplicate_code_is_conflict() {
        let store = test_store();
        store.create(&make_batch("A1B2C", BatchKind::Live)).unwrap();
        let err = store.create(&make_batch("A1B2C", BatchKind::Live)).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn claim_transitions_pending_to_processing() {
        let store = test_store();
        store.create(&make_batch("AAAAA", BatchKind::Live)).unwrap();

        let claimed = store.claim_next_pending().unwrap().unwrap();
        assert_eq!(claimed.status, BatchStatus::Processing);
        assert_eq!(
            store.get_by_code("AAAAA").unwrap().status,
            BatchStatus::Processing
        );

        // Nothing left to claim.
        assert!(store.claim_next_pending().unwrap().is_none());
    }

    #[test]
    fn fail_requires_processing() {
        let store = test_store();
        store.create(&make_batch("AAAAA", BatchKind::Live)).unwrap();

        let mut batch = store.get_by_code("AAAAA").unwrap();
        batch.error = Some("renderer down".into());
        batch.status = BatchStatus::Failed;
        batch.update_at = now_rfc3339();

        // Still PENDING — the CAS must not apply.
        assert!(!store.fail(&batch).unwrap());

        store.claim_next_pending().unwrap().unwrap();
        assert!(store.fail(&batch).unwrap());

        let got = store.get_by_code("AAAAA").unwrap();
        assert_eq!(got.status, BatchStatus::Failed);
        assert_eq!(got.error.as_deref(), Some("renderer down"));
    }

    #[test]
    fn listing_hides_ghosts_by_default() {
        let store = test_store();
        store.create(&make_batch("LIVEA", BatchKind::Live)).unwrap();
        store.create(&make_batch("GHOST", BatchKind::Ghost)).unwrap();

        let normal = store
            .list(&ListParams::default(), &BatchFilters::default())
            .unwrap();
        assert_eq!(normal.total, 1);
        assert_eq!(normal.items[0].code, "LIVEA");

        let all = store
            .list(
                &ListParams::default(),
                &BatchFilters { include_ghost: true, ..Default::default() },
            )
            .unwrap();
        assert_eq!(all.total, 2);
    }

    #[test]
    fn stale_processing_detection() {
        let store = test_store();
        store.create(&make_batch("STUCK", BatchKind::Live)).unwrap();
        store.claim_next_pending().unwrap().unwrap();

        // Everything updated before a future cutoff counts as stale.
        let stale = store.stale_processing("9999-01-01T00:00:00+00:00").unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].code, "STUCK");

        // A past cutoff matches nothing.
        let stale = store.stale_processing("2000-01-01T00:00:00+00:00").unwrap();
        assert!(stale.is_empty());
    }
}
