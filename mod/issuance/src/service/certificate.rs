use serde::Serialize;

use qrseal_core::{CallerIdentity, ServiceError, new_id, now_rfc3339};
use qrseal_render::CertificateSpec;
use qrseal_sql::SQLError;

use crate::model::{Certificate, OwnerFields, QrStatus, VehicleFields};
use crate::payload::parse_payload;

use super::IssuanceService;

/// Input for certificate issuance — the consumption of one QR code.
pub struct IssueCertificateInput {
    pub qr_value: String,
    /// Code of the inspecting RTO; the certificate number is derived
    /// from it.
    pub inspection_rto: String,
    pub vehicle: VehicleFields,
    pub owner: OwnerFields,
    pub photo_refs: Vec<String>,
    pub issued_by: Option<String>,
}

/// Read-side validation result for a scanned payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub value: String,
    pub state: String,
    pub oem: String,
    pub product: String,
    pub serial: i64,
    pub batch_id: String,
    pub status: QrStatus,
}

impl IssuanceService {
    /// Validate a scanned payload without consuming anything.
    ///
    /// Checks run in order: payload structure (before any DB access),
    /// origin, the caller's permitted scope, code existence, stored scope
    /// vs payload segments (tamper defense), and consumption status.
    /// Issuance re-checks the status transactionally — this read-side
    /// pass cannot close the time-of-check/time-of-use gap by itself.
    pub fn validate_payload(
        &self,
        payload_url: &str,
        caller: &CallerIdentity,
    ) -> Result<ValidationReport, ServiceError> {
        let parts = parse_payload(payload_url)?;

        if parts.origin != self.payload_origin {
            return Err(ServiceError::Validation(format!(
                "payload origin '{}' is not recognised",
                parts.origin
            )));
        }

        caller.require_scope(&parts.state, &parts.oem)?;

        let code = self.codes.find_by_value(&parts.value)?;
        if code.state != parts.state || code.oem != parts.oem || code.product != parts.product {
            return Err(ServiceError::Validation(
                "payload scope does not match the issued code".into(),
            ));
        }

        if code.status == QrStatus::Used {
            return Err(ServiceError::Conflict("QR code already used".into()));
        }

        Ok(ValidationReport {
            value: code.value,
            state: code.state,
            oem: code.oem,
            product: code.product,
            serial: code.serial,
            batch_id: code.batch_id,
            status: code.status,
        })
    }

    /// Issue the installation certificate for a code — the exactly-once
    /// consumption path.
    ///
    /// Rendering and upload happen first; only the artifact URL enters
    /// the transaction. The transaction pairs the guarded UNUSED→USED
    /// flip with the certificate insert, so a concurrent issuance of the
    /// same value commits exactly once and the loser gets a Conflict.
    pub fn issue_certificate(
        &self,
        input: IssueCertificateInput,
    ) -> Result<Certificate, ServiceError> {
        let code = self.codes.find_by_value(&input.qr_value)?;
        if code.status == QrStatus::Used {
            return Err(ServiceError::Conflict("QR code already used".into()));
        }

        let rto = self.refdata.get_rto(&input.inspection_rto)?;
        if rto.state != code.state {
            return Err(ServiceError::Validation(format!(
                "RTO {} belongs to state {}, code was issued for {}",
                rto.code, rto.state, code.state
            )));
        }

        if input.vehicle.registration_no.is_empty() || input.owner.name.is_empty() {
            return Err(ServiceError::Validation(
                "registration number and owner name are required".into(),
            ));
        }

        // Deterministic: RTO code + QR value. Reproducible, and unique as
        // long as values are (the UNIQUE index on number is the backstop).
        let number = format!("{}{}", rto.code, code.value);
        let now = now_rfc3339();

        let doc = CertificateSpec {
            number: number.clone(),
            qr_value: code.value.clone(),
            fields: certificate_fields(&input.vehicle, &input.owner),
            photo_refs: input.photo_refs.clone(),
            issued_at: now.clone(),
        };
        let bytes = self
            .renderer
            .render_certificate(&doc)
            .map_err(|e| ServiceError::Transient(format!("certificate render failed: {e}")))?;
        let url = self
            .blob
            .put(&format!("certificates/{}", number), &bytes)
            .map_err(|e| ServiceError::Transient(format!("artifact upload failed: {e}")))?;

        let cert = Certificate {
            id: new_id(),
            number,
            qr_id: code.id.clone(),
            qr_value: code.value.clone(),
            rto: rto.code,
            vehicle: input.vehicle,
            owner: input.owner,
            photo_refs: input.photo_refs,
            artifact_url: url,
            issued_by: input.issued_by,
            create_at: now,
        };

        let stmts = [
            self.codes.mark_used_statement(&code.id),
            self.certificates.insert_statement(&cert)?,
        ];
        self.db.exec_tx(&stmts).map_err(|e| match e {
            SQLError::Aborted(_) => ServiceError::Conflict("QR code already used".into()),
            other => {
                let msg = other.to_string();
                if msg.contains("UNIQUE constraint") {
                    ServiceError::Conflict(msg)
                } else {
                    ServiceError::Storage(msg)
                }
            }
        })?;

        Ok(cert)
    }

    pub fn get_certificate(&self, number: &str) -> Result<Certificate, ServiceError> {
        self.certificates.get_by_number(number)
    }
}

/// Label/value pairs rendered onto the certificate document.
fn certificate_fields(vehicle: &VehicleFields, owner: &OwnerFields) -> Vec<(String, String)> {
    let mut fields = vec![
        ("registrationNo".to_string(), vehicle.registration_no.clone()),
        ("chassisNo".to_string(), vehicle.chassis_no.clone()),
        ("engineNo".to_string(), vehicle.engine_no.clone()),
    ];
    if let Some(make) = &vehicle.make {
        fields.push(("make".to_string(), make.clone()));
    }
    if let Some(model) = &vehicle.model {
        fields.push(("model".to_string(), model.clone()));
    }
    fields.push(("ownerName".to_string(), owner.name.clone()));
    if let Some(phone) = &owner.phone {
        fields.push(("ownerPhone".to_string(), phone.clone()));
    }
    if let Some(address) = &owner.address {
        fields.push(("ownerAddress".to_string(), address.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QrCode;
    use crate::service::RequestBatchInput;
    use crate::service::testutil::{TEST_ORIGIN, test_service};
    use qrseal_core::ROLE_OEM_OPERATOR;
    use std::sync::Arc;

    fn completed_codes(svc: &Arc<IssuanceService>, quantity: u32) -> Vec<QrCode> {
        let batch = svc
            .request_batch(RequestBatchInput {
                state: "MH".into(),
                oem: "TATA".into(),
                product: "C3".into(),
                quantity,
                code: None,
                requested_by: None,
            })
            .unwrap();
        while svc.claim_and_generate().unwrap() {}

        let done = svc.get_batch(&batch.code).unwrap();
        (done.start_serial.unwrap()..=done.end_serial.unwrap())
            .map(|serial| svc.codes.find_by_serial("MH", "TATA", serial).unwrap())
            .collect()
    }

    fn issue_input(value: &str) -> IssueCertificateInput {
        IssueCertificateInput {
            qr_value: value.into(),
            inspection_rto: "MH01".into(),
            vehicle: VehicleFields {
                registration_no: "MH12AB1234".into(),
                chassis_no: "CH1".into(),
                engine_no: "EN1".into(),
                make: Some("Tata".into()),
                model: None,
            },
            owner: OwnerFields {
                name: "A. Kulkarni".into(),
                phone: Some("9800000000".into()),
                address: None,
            },
            photo_refs: vec!["photos/install-1.jpg".into()],
            issued_by: Some("op1".into()),
        }
    }

    #[test]
    fn issue_binds_code_to_exactly_one_certificate() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let value = codes[0].value.clone();

        let cert = svc.issue_certificate(issue_input(&value)).unwrap();
        assert_eq!(cert.number, format!("MH01{}", value));
        assert!(cert.artifact_url.contains("certificates/"));
        assert_eq!(
            svc.codes.find_by_value(&value).unwrap().status,
            QrStatus::Used
        );

        // Second issuance of the same value must conflict.
        let err = svc.issue_certificate(issue_input(&value)).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn concurrent_issue_commits_exactly_once() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let value = codes[0].value.clone();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let svc = Arc::clone(&svc);
            let value = value.clone();
            handles.push(std::thread::spawn(move || {
                svc.issue_certificate(issue_input(&value)).is_ok()
            }));
        }

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);

        let code = svc.codes.find_by_value(&value).unwrap();
        assert_eq!(code.status, QrStatus::Used);
        assert!(svc.certificates.find_by_qr(&code.id).unwrap().is_some());
    }

    #[test]
    fn unknown_value_is_not_found() {
        let (_dir, svc) = test_service();
        let err = svc.issue_certificate(issue_input("DOESNOTEXIST0000")).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn unknown_rto_rejected() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let mut input = issue_input(&codes[0].value);
        input.inspection_rto = "XX99".into();
        assert!(svc.issue_certificate(input).is_err());

        // Code stayed unused — issuance aborted before the transaction.
        assert_eq!(
            svc.codes.find_by_value(&codes[0].value).unwrap().status,
            QrStatus::Unused
        );
    }

    #[test]
    fn validation_abort_leaves_code_unused() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let value = codes[0].value.clone();

        let mut input = issue_input(&value);
        input.vehicle.registration_no = String::new();
        assert!(svc.issue_certificate(input).is_err());
        assert_eq!(
            svc.codes.find_by_value(&value).unwrap().status,
            QrStatus::Unused
        );
    }

    #[test]
    fn validate_then_issue_flow() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let caller = CallerIdentity::admin("root");

        let report = svc.validate_payload(&codes[0].payload, &caller).unwrap();
        assert_eq!(report.serial, codes[0].serial);
        assert_eq!(report.status, QrStatus::Unused);

        svc.issue_certificate(issue_input(&codes[0].value)).unwrap();

        let err = svc.validate_payload(&codes[0].payload, &caller).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn validate_rejects_malformed_before_lookup() {
        let (_dir, svc) = test_service();
        let caller = CallerIdentity::admin("root");

        // Three segments only — parser failure, no DB involved.
        let err = svc
            .validate_payload("https://x.com/MH/TATA/qr=ABC", &caller)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn validate_rejects_foreign_origin() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let caller = CallerIdentity::admin("root");

        let forged = codes[0]
            .payload
            .replace(TEST_ORIGIN, "https://evil.example.com");
        let err = svc.validate_payload(&forged, &caller).unwrap_err();
        assert!(err.to_string().contains("origin"));
    }

    #[test]
    fn validate_rejects_tampered_scope() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);
        let caller = CallerIdentity::admin("root");

        // Same value, product segment rewritten: stored scope wins.
        let tampered = codes[0].payload.replace("/C3/", "/C9/");
        let err = svc.validate_payload(&tampered, &caller).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn validate_enforces_caller_scope() {
        let (_dir, svc) = test_service();
        let codes = completed_codes(&svc, 1);

        let outsider = CallerIdentity {
            sub: "op2".into(),
            role: ROLE_OEM_OPERATOR.into(),
            state: Some("KA".into()),
            oem: Some("TATA".into()),
        };
        let err = svc.validate_payload(&codes[0].payload, &outsider).unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }
}
