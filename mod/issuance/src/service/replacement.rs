use serde::Serialize;

use qrseal_core::{ServiceError, new_id};
use qrseal_render::{SheetItem, SheetSpec};

use crate::model::QrStatus;
use crate::service::batch::MAX_BATCH_QUANTITY;

use super::IssuanceService;

/// Input for a bulk replacement reprint of still-unused stock.
pub struct ReplacementInput {
    pub state: String,
    pub oem: String,
    pub serials: Vec<i64>,
    pub requested_by: Option<String>,
}

/// Outcome of a bulk replacement: which serials made it onto the sheet
/// and how many were skipped as already consumed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementResult {
    pub processed_count: usize,
    pub skipped_count: usize,
    pub processed_serials: Vec<i64>,
    pub artifact_url: String,
}

impl IssuanceService {
    /// Reprint a set of still-UNUSED codes as one artifact.
    ///
    /// USED codes among the requested serials are silently skipped and
    /// counted; serials matching nothing in scope are simply absent from
    /// the result. Survivors are ordered by (state, oem, product, serial)
    /// for deterministic sheet layout. Never mutates code state — this is
    /// a reprint, not a consumption event.
    pub fn bulk_replacement(
        &self,
        input: ReplacementInput,
    ) -> Result<ReplacementResult, ServiceError> {
        if input.serials.is_empty() {
            return Err(ServiceError::Validation("no serials requested".into()));
        }
        if input.serials.len() > MAX_BATCH_QUANTITY as usize {
            return Err(ServiceError::Validation(format!(
                "at most {} serials per replacement, got {}",
                MAX_BATCH_QUANTITY,
                input.serials.len()
            )));
        }

        let found = self
            .codes
            .select_by_serials(&input.state, &input.oem, &input.serials)?;

        let (unused, used): (Vec<_>, Vec<_>) = found
            .into_iter()
            .partition(|c| c.status == QrStatus::Unused);

        if unused.is_empty() {
            return Err(ServiceError::NotFound(
                "no unused codes among the requested serials".into(),
            ));
        }

        // Replacement sheets may span products; the scope columns of each
        // item's payload stay authoritative.
        let sheet_code = format!("R{}", new_id()[..7].to_uppercase());
        let sheet = SheetSpec {
            batch_code: sheet_code.clone(),
            state: input.state.clone(),
            oem: input.oem.clone(),
            product: "*".into(),
            replacement: true,
            items: unused
                .iter()
                .map(|c| SheetItem { serial: c.serial, payload: c.payload.clone() })
                .collect(),
        };
        let bytes = self
            .renderer
            .render_sheet(&sheet)
            .map_err(|e| ServiceError::Transient(format!("sheet render failed: {e}")))?;
        let artifact_url = self
            .blob
            .put(&format!("replacements/{}", sheet_code), &bytes)
            .map_err(|e| ServiceError::Transient(format!("artifact upload failed: {e}")))?;

        Ok(ReplacementResult {
            processed_count: unused.len(),
            skipped_count: used.len(),
            processed_serials: unused.iter().map(|c| c.serial).collect(),
            artifact_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OwnerFields, VehicleFields};
    use crate::service::{IssueCertificateInput, RequestBatchInput};
    use crate::service::testutil::test_service;
    use std::sync::Arc;

    /// Five completed codes; the serial at `used_offset` gets consumed.
    fn setup(svc: &Arc<IssuanceService>, used_offset: usize) -> Vec<i64> {
        let batch = svc
            .request_batch(RequestBatchInput {
                state: "MH".into(),
                oem: "TATA".into(),
                product: "C3".into(),
                quantity: 5,
                code: None,
                requested_by: None,
            })
            .unwrap();
        while svc.claim_and_generate().unwrap() {}
        let done = svc.get_batch(&batch.code).unwrap();
        let serials: Vec<i64> =
            (done.start_serial.unwrap()..=done.end_serial.unwrap()).collect();

        let victim = svc
            .codes
            .find_by_serial("MH", "TATA", serials[used_offset])
            .unwrap();
        svc.issue_certificate(IssueCertificateInput {
            qr_value: victim.value,
            inspection_rto: "MH01".into(),
            vehicle: VehicleFields {
                registration_no: "MH12AB1234".into(),
                chassis_no: "CH1".into(),
                engine_no: "EN1".into(),
                make: None,
                model: None,
            },
            owner: OwnerFields { name: "A. Kulkarni".into(), phone: None, address: None },
            photo_refs: vec![],
            issued_by: None,
        })
        .unwrap();

        serials
    }

    fn replacement(serials: Vec<i64>) -> ReplacementInput {
        ReplacementInput {
            state: "MH".into(),
            oem: "TATA".into(),
            serials,
            requested_by: None,
        }
    }

    #[test]
    fn used_codes_are_skipped_and_counted() {
        let (_dir, svc) = test_service();
        let serials = setup(&svc, 1);

        // Request [s0, s1, s2] where s1 is used.
        let result = svc
            .bulk_replacement(replacement(vec![serials[0], serials[1], serials[2]]))
            .unwrap();
        assert_eq!(result.processed_count, 2);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.processed_serials, vec![serials[0], serials[2]]);
        assert!(result.artifact_url.contains("replacements/"));
    }

    #[test]
    fn unknown_serials_are_ignored() {
        let (_dir, svc) = test_service();
        let serials = setup(&svc, 0);

        let result = svc
            .bulk_replacement(replacement(vec![serials[1], 999_999]))
            .unwrap();
        assert_eq!(result.processed_count, 1);
        assert_eq!(result.skipped_count, 0);
    }

    #[test]
    fn all_used_is_not_found() {
        let (_dir, svc) = test_service();
        let serials = setup(&svc, 0);

        let err = svc.bulk_replacement(replacement(vec![serials[0]])).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn replacement_never_mutates_status() {
        let (_dir, svc) = test_service();
        let serials = setup(&svc, 0);

        svc.bulk_replacement(replacement(serials[1..].to_vec())).unwrap();
        for serial in &serials[1..] {
            let code = svc.codes.find_by_serial("MH", "TATA", *serial).unwrap();
            assert_eq!(code.status, QrStatus::Unused);
        }
    }

    #[test]
    fn empty_request_rejected() {
        let (_dir, svc) = test_service();
        assert!(svc.bulk_replacement(replacement(vec![])).is_err());
    }
}
