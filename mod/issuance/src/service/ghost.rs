use tracing::info;

use qrseal_core::{ServiceError, new_id, now_rfc3339};
use qrseal_render::{SheetItem, SheetSpec};

use crate::model::{Batch, BatchKind, BatchStatus};
use crate::service::batch::MAX_BATCH_QUANTITY;
use crate::store::map_sql_err;

use super::IssuanceService;

/// Input for ghost (duplicate-reprint) batch regeneration.
pub struct GhostRequestInput {
    pub state: String,
    pub oem: String,
    pub product: String,
    /// Reprint window starts at this serial.
    pub start_serial: i64,
    /// Upper bound on how many used codes to reprint.
    pub quantity: u32,
    pub requested_by: Option<String>,
}

impl IssuanceService {
    /// Request a ghost batch: a reprint sheet over already-USED serials.
    ///
    /// Eligibility is checked synchronously — zero matching codes is a
    /// NotFound, a partial window proceeds with what exists. The batch
    /// then runs through the same worker pipeline as live batches, but
    /// its generation allocates no serials and inserts no code rows: the
    /// live sequence is untouched.
    pub fn request_ghost_batch(&self, input: GhostRequestInput) -> Result<Batch, ServiceError> {
        if input.quantity == 0 || input.quantity > MAX_BATCH_QUANTITY {
            return Err(ServiceError::Validation(format!(
                "quantity must be between 1 and {}, got {}",
                MAX_BATCH_QUANTITY, input.quantity
            )));
        }
        self.refdata
            .validate_scope(&input.state, &input.oem, &input.product)?;

        let eligible = self.codes.select_used_from(
            &input.state,
            &input.oem,
            &input.product,
            input.start_serial,
            input.quantity,
        )?;
        if eligible.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "no used codes at or after serial {} in {}/{}/{}",
                input.start_serial, input.state, input.oem, input.product
            )));
        }

        let now = now_rfc3339();
        let batch = Batch {
            id: new_id(),
            code: self.free_batch_code()?,
            state: input.state,
            oem: input.oem,
            product: input.product,
            quantity: eligible.len() as u32,
            kind: BatchKind::Ghost,
            status: BatchStatus::Pending,
            start_serial: None,
            end_serial: None,
            artifact_url: None,
            error: None,
            ghost_from_serial: Some(input.start_serial),
            requested_by: input.requested_by,
            create_at: now.clone(),
            update_at: now,
        };

        self.batches.create(&batch)?;
        info!(batch = %batch.code, quantity = batch.quantity, "ghost batch accepted");
        self.wake_workers();

        Ok(batch)
    }

    /// Ghost generation: re-select the used codes, render a sheet marked
    /// REPLACEMENT, upload it, and complete the batch with the actual
    /// count and serial bounds. No sequence allocation, no code inserts.
    pub(crate) fn generate_ghost(&self, batch: &Batch) -> Result<Batch, ServiceError> {
        let from = batch
            .ghost_from_serial
            .ok_or_else(|| ServiceError::Internal("ghost batch without a start serial".into()))?;

        let selected = self.codes.select_used_from(
            &batch.state,
            &batch.oem,
            &batch.product,
            from,
            batch.quantity,
        )?;
        if selected.is_empty() {
            return Err(ServiceError::NotFound(
                "no used codes remain in the reprint window".into(),
            ));
        }

        let sheet = SheetSpec {
            batch_code: batch.code.clone(),
            state: batch.state.clone(),
            oem: batch.oem.clone(),
            product: batch.product.clone(),
            replacement: true,
            items: selected
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
        done.quantity = selected.len() as u32;
        done.start_serial = selected.first().map(|c| c.serial);
        done.end_serial = selected.last().map(|c| c.serial);
        done.artifact_url = Some(url);
        done.status = BatchStatus::Completed;
        done.update_at = now_rfc3339();

        self.db
            .exec_tx(&[self.batches.completion_statement(&done)?])
            .map_err(map_sql_err)?;

        Ok(done)
    }
}
