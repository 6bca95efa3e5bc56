use std::collections::HashSet;

use tracing::{error, info, warn};

use qrseal_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use qrseal_render::{SheetItem, SheetSpec};
use qrseal_sql::TxStatement;

use crate::model::{Batch, BatchKind, BatchStatus, QrCode, QrStatus, Scope};
use crate::payload::{build_payload, check_batch_code, generate_batch_code, generate_value};
use crate::store::{BatchFilters, map_sql_err};

use super::IssuanceService;

/// Hard cap on stickers per batch, bounding worst-case artifact size and
/// generation time.
pub const MAX_BATCH_QUANTITY: u32 = 1000;

/// Attempts at finding a free generated batch code.
const CODE_RETRIES: usize = 5;

pub struct RequestBatchInput {
    pub state: String,
    pub oem: String,
    pub product: String,
    pub quantity: u32,
    /// Caller-supplied batch code. Collision is a hard failure.
    pub code: Option<String>,
    pub requested_by: Option<String>,
}

impl IssuanceService {
    // ── Request path (synchronous) ──

    /// Accept a batch request: validate, insert PENDING, wake the
    /// workers, return immediately. Callers poll the batch status.
    pub fn request_batch(&self, input: RequestBatchInput) -> Result<Batch, ServiceError> {
        if input.quantity == 0 || input.quantity > MAX_BATCH_QUANTITY {
            return Err(ServiceError::Validation(format!(
                "quantity must be between 1 and {}, got {}",
                MAX_BATCH_QUANTITY, input.quantity
            )));
        }
        self.refdata
            .validate_scope(&input.state, &input.oem, &input.product)?;

        let code = match input.code {
            Some(code) => {
                check_batch_code(&code)?;
                if self.batches.code_exists(&code)? {
                    return Err(ServiceError::Conflict(format!(
                        "batch code '{}' already exists",
                        code
                    )));
                }
                code
            }
            None => self.free_batch_code()?,
        };

        let now = now_rfc3339();
        let batch = Batch {
            id: new_id(),
            code,
            state: input.state,
            oem: input.oem,
            product: input.product,
            quantity: input.quantity,
            kind: BatchKind::Live,
            status: BatchStatus::Pending,
            start_serial: None,
            end_serial: None,
            artifact_url: None,
            error: None,
            ghost_from_serial: None,
            requested_by: input.requested_by,
            create_at: now.clone(),
            update_at: now,
        };

        self.batches.create(&batch)?;
        info!(batch = %batch.code, quantity = batch.quantity, "batch accepted");
        self.wake_workers();

        Ok(batch)
    }

    /// Generate a batch code not currently in use.
    pub(crate) fn free_batch_code(&self) -> Result<String, ServiceError> {
        for _ in 0..CODE_RETRIES {
            let code = generate_batch_code();
            if !self.batches.code_exists(&code)? {
                return Ok(code);
            }
        }
        Err(ServiceError::Internal(format!(
            "no free batch code after {} attempts",
            CODE_RETRIES
        )))
    }

    pub fn get_batch(&self, code: &str) -> Result<Batch, ServiceError> {
        self.batches.get_by_code(code)
    }

    pub fn list_batches(
        &self,
        params: &ListParams,
        filters: &BatchFilters,
    ) -> Result<ListResult<Batch>, ServiceError> {
        self.batches.list(params, filters)
    }

    /// Batches stuck in PROCESSING since before `cutoff`, for the
    /// watchdog.
    pub fn stale_processing(&self, cutoff: &str) -> Result<Vec<Batch>, ServiceError> {
        self.batches.stale_processing(cutoff)
    }

    // ── Generation path (worker side) ──

    /// Claim the oldest PENDING batch and run its generation to a
    /// terminal state. Returns false when no work was available.
    pub fn claim_and_generate(&self) -> Result<bool, ServiceError> {
        match self.batches.claim_next_pending()? {
            None => Ok(false),
            Some(batch) => {
                self.run_generation(batch);
                Ok(true)
            }
        }
    }

    /// Drive a claimed (PROCESSING) batch to COMPLETED or FAILED. Never
    /// returns an error: failures are persisted on the batch row.
    pub(crate) fn run_generation(&self, batch: Batch) {
        let code = batch.code.clone();
        let result = match batch.kind {
            BatchKind::Live => self.generate_live(&batch),
            BatchKind::Ghost => self.generate_ghost(&batch),
        };

        match result {
            Ok(done) => info!(
                batch = %code,
                start = done.start_serial,
                end = done.end_serial,
                "batch generation completed"
            ),
            Err(e) => {
                error!(batch = %code, error = %e, "batch generation failed");
                self.record_failure(batch, &e);
            }
        }
    }

    /// Live generation: allocate serials, mint codes, render the sheet,
    /// upload it, then commit the code rows and the COMPLETED transition
    /// in one transaction. Any earlier failure leaves zero code rows.
    fn generate_live(&self, batch: &Batch) -> Result<Batch, ServiceError> {
        let scope = Scope::new(&batch.state, &batch.oem, &batch.product);
        let start = self
            .sequences
            .allocate(&scope.sequence_key(), batch.quantity)?;

        let now = now_rfc3339();
        let mut seen = HashSet::new();
        let mut codes = Vec::with_capacity(batch.quantity as usize);
        for i in 0..batch.quantity as i64 {
            // Uniqueness within the batch; the UNIQUE index covers the rest.
            let value = loop {
                let v = generate_value();
                if seen.insert(v.clone()) {
                    break v;
                }
            };
            let payload = build_payload(&self.payload_origin, &scope, &value);
            codes.push(QrCode {
                id: new_id(),
                batch_id: batch.id.clone(),
                state: batch.state.clone(),
                oem: batch.oem.clone(),
                product: batch.product.clone(),
                serial: start + i,
                value,
                payload,
                status: QrStatus::Unused,
                create_at: now.clone(),
                update_at: now.clone(),
            });
        }

        let sheet = SheetSpec {
            batch_code: batch.code.clone(),
            state: batch.state.clone(),
            oem: batch.oem.clone(),
            product: batch.product.clone(),
            replacement: false,
            items: codes
                .iter()
                .map(|c| SheetItem { serial: c.serial, payload: c.payload.clone() })
                .collect(),
        };
        let bytes = self
            .renderer
            .render_sheet(&sheet)
            .map_err(|e| ServiceError::Transient(format!("sheet render failed: {e}")))?;
        let url = self
            .blob
            .put(&format!("batches/{}", batch.code), &bytes)
            .map_err(|e| ServiceError::Transient(format!("artifact upload failed: {e}")))?;

        let mut done = batch.clone();
        done.status = BatchStatus::Completed;
        done.start_serial = Some(start);
        done.end_serial = Some(start + batch.quantity as i64 - 1);
        done.artifact_url = Some(url);
        done.update_at = now_rfc3339();

        let mut stmts: Vec<TxStatement> =
            codes.iter().map(|c| self.codes.insert_statement(c)).collect();
        stmts.push(self.batches.completion_statement(&done)?);
        self.db.exec_tx(&stmts).map_err(map_sql_err)?;

        Ok(done)
    }

    /// Record a terminal FAILED state for a PROCESSING batch.
    pub(crate) fn record_failure(&self, mut batch: Batch, err: &ServiceError) {
        batch.status = BatchStatus::Failed;
        batch.error = Some(err.to_string());
        batch.update_at = now_rfc3339();

        match self.batches.fail(&batch) {
            Ok(true) => {}
            Ok(false) => warn!(
                batch = %batch.code,
                "batch left PROCESSING before failure could be recorded"
            ),
            Err(e) => error!(batch = %batch.code, error = %e, "failed to record batch failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::test_service;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn request(quantity: u32, code: Option<&str>) -> RequestBatchInput {
        RequestBatchInput {
            state: "MH".into(),
            oem: "TATA".into(),
            product: "C3".into(),
            quantity,
            code: code.map(str::to_string),
            requested_by: Some("op1".into()),
        }
    }

    #[test]
    fn request_returns_pending_immediately() {
        let (_dir, svc) = test_service();
        let batch = svc.request_batch(request(3, None)).unwrap();
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.code.len(), 5);
        assert!(batch.start_serial.is_none());

        // Nothing generated until a worker claims it.
        assert_eq!(svc.codes.count_for_batch(&batch.id).unwrap(), 0);
    }

    #[test]
    fn quantity_bounds_enforced() {
        let (_dir, svc) = test_service();
        assert!(svc.request_batch(request(0, None)).is_err());
        assert!(svc.request_batch(request(1001, None)).is_err());
        assert!(svc.request_batch(request(1000, None)).is_ok());
    }

    #[test]
    fn unknown_scope_rejected() {
        let (_dir, svc) = test_service();
        let mut input = request(3, None);
        input.product = "ZZ".into();
        assert!(svc.request_batch(input).is_err());

        // OEM not authorized for KA.
        let mut input = request(3, None);
        input.state = "KA".into();
        assert!(matches!(
            svc.request_batch(input),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn supplied_code_collision_is_hard_failure() {
        let (_dir, svc) = test_service();
        svc.request_batch(request(2, Some("AAAA1"))).unwrap();
        let err = svc.request_batch(request(2, Some("AAAA1"))).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        assert!(svc.request_batch(request(2, Some("bad"))).is_err());
    }

    #[test]
    fn generation_completes_batch_with_contiguous_unique_codes() {
        let (_dir, svc) = test_service();
        let batch = svc.request_batch(request(3, None)).unwrap();

        assert!(svc.claim_and_generate().unwrap());
        assert!(!svc.claim_and_generate().unwrap());

        let done = svc.get_batch(&batch.code).unwrap();
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.start_serial, Some(1000));
        assert_eq!(done.end_serial, Some(1002));
        assert!(done.artifact_url.is_some());

        assert_eq!(svc.codes.count_for_batch(&batch.id).unwrap(), 3);

        let mut values = HashSet::new();
        for serial in 1000..=1002 {
            let code = svc.codes.find_by_serial("MH", "TATA", serial).unwrap();
            assert_eq!(code.status, QrStatus::Unused);
            assert!(code.payload.starts_with("https://q.example.com/MH/TATA/C3/qr="));
            assert!(values.insert(code.value));
        }
    }

    #[test]
    fn consecutive_batches_get_disjoint_ranges() {
        let (_dir, svc) = test_service();
        let a = svc.request_batch(request(4, None)).unwrap();
        let b = svc.request_batch(request(2, None)).unwrap();

        while svc.claim_and_generate().unwrap() {}

        let a = svc.get_batch(&a.code).unwrap();
        let b = svc.get_batch(&b.code).unwrap();
        assert_eq!(a.start_serial, Some(1000));
        assert_eq!(a.end_serial, Some(1003));
        assert_eq!(b.start_serial, Some(1004));
        assert_eq!(b.end_serial, Some(1005));
    }

    #[test]
    fn renderer_failure_fails_batch_without_code_rows() {
        let (_dir, svc) = crate::service::testutil::test_service_with_renderer(Arc::new(
            qrseal_render::FailingRenderer,
        ));
        let batch = svc.request_batch(request(3, None)).unwrap();

        assert!(svc.claim_and_generate().unwrap());

        let failed = svc.get_batch(&batch.code).unwrap();
        assert_eq!(failed.status, BatchStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("render"));

        // All-or-nothing: no partial rows.
        assert_eq!(svc.codes.count_for_batch(&batch.id).unwrap(), 0);

        // The failed range is gone for good — the next batch starts after it.
        let next = svc.request_batch(request(1, None)).unwrap();
        while svc.claim_and_generate().unwrap() {}
        let next = svc.get_batch(&next.code).unwrap();
        assert_eq!(next.start_serial, Some(1003));
    }

    #[test]
    fn listing_filters() {
        let (_dir, svc) = test_service();
        svc.request_batch(request(2, Some("AAAA1"))).unwrap();
        svc.request_batch(request(2, Some("AAAA2"))).unwrap();

        let pending = svc
            .list_batches(
                &ListParams::default(),
                &BatchFilters {
                    status: Some("PENDING".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pending.total, 2);

        let other_state = svc
            .list_batches(
                &ListParams::default(),
                &BatchFilters { state: Some("KA".into()), ..Default::default() },
            )
            .unwrap();
        assert_eq!(other_state.total, 0);
    }
}
