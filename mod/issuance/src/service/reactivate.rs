use tracing::info;

use qrseal_core::ServiceError;
use qrseal_sql::SQLError;

use crate::model::QrStatus;

use super::IssuanceService;

impl IssuanceService {
    /// Administrative undo: delete a code's certificate and reset it to
    /// UNUSED, in one transaction.
    ///
    /// Serials within a (state, oem) scope come from a single sequence,
    /// so the lookup needs no product. This erases issuance history for
    /// the code — the HTTP layer restricts it to admins.
    pub fn reactivate(&self, state: &str, oem: &str, serial: i64) -> Result<(), ServiceError> {
        let code = self.codes.find_by_serial(state, oem, serial)?;

        if code.status == QrStatus::Unused {
            return Err(ServiceError::Conflict(format!(
                "serial {} in {}/{} is not used",
                serial, state, oem
            )));
        }

        let stmts = [
            self.certificates.delete_by_qr_statement(&code.id),
            self.codes.mark_unused_statement(&code.id),
        ];
        self.db.exec_tx(&stmts).map_err(|e| match e {
            // The guarded flip saw a concurrent reactivation.
            SQLError::Aborted(_) => ServiceError::Conflict(format!(
                "serial {} in {}/{} is not used",
                serial, state, oem
            )),
            other => ServiceError::Storage(other.to_string()),
        })?;

        info!(state, oem, serial, "code reactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OwnerFields, VehicleFields};
    use crate::service::{IssueCertificateInput, RequestBatchInput};
    use crate::service::testutil::test_service;
    use std::sync::Arc;

    fn issue_input(value: &str) -> IssueCertificateInput {
        IssueCertificateInput {
            qr_value: value.into(),
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
        }
    }

    fn one_issued_code(svc: &Arc<IssuanceService>) -> (i64, String) {
        let batch = svc
            .request_batch(RequestBatchInput {
                state: "MH".into(),
                oem: "TATA".into(),
                product: "C3".into(),
                quantity: 1,
                code: None,
                requested_by: None,
            })
            .unwrap();
        while svc.claim_and_generate().unwrap() {}
        let done = svc.get_batch(&batch.code).unwrap();
        let serial = done.start_serial.unwrap();

        let code = svc.codes.find_by_serial("MH", "TATA", serial).unwrap();
        svc.issue_certificate(issue_input(&code.value)).unwrap();
        (serial, code.value)
    }

    #[test]
    fn reactivate_removes_certificate_and_resets_status() {
        let (_dir, svc) = test_service();
        let (serial, value) = one_issued_code(&svc);

        let code = svc.codes.find_by_value(&value).unwrap();
        assert_eq!(code.status, QrStatus::Used);
        assert!(svc.certificates.find_by_qr(&code.id).unwrap().is_some());

        svc.reactivate("MH", "TATA", serial).unwrap();

        let code = svc.codes.find_by_value(&value).unwrap();
        assert_eq!(code.status, QrStatus::Unused);
        assert!(svc.certificates.find_by_qr(&code.id).unwrap().is_none());
    }

    #[test]
    fn reactivate_then_issue_cycle_repeats() {
        let (_dir, svc) = test_service();
        let (serial, value) = one_issued_code(&svc);

        for _ in 0..3 {
            svc.reactivate("MH", "TATA", serial).unwrap();
            let cert = svc.issue_certificate(issue_input(&value)).unwrap();
            assert_eq!(cert.number, format!("MH01{}", value));
        }
    }

    #[test]
    fn unknown_serial_is_not_found() {
        let (_dir, svc) = test_service();
        let err = svc.reactivate("MH", "TATA", 424242).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn unused_code_cannot_be_reactivated() {
        let (_dir, svc) = test_service();
        let batch = svc
            .request_batch(RequestBatchInput {
                state: "MH".into(),
                oem: "TATA".into(),
                product: "C3".into(),
                quantity: 1,
                code: None,
                requested_by: None,
            })
            .unwrap();
        while svc.claim_and_generate().unwrap() {}
        let serial = svc.get_batch(&batch.code).unwrap().start_serial.unwrap();

        let err = svc.reactivate("MH", "TATA", serial).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
