use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;

use qrseal_core::CallerIdentity;

use crate::model::{Certificate, OwnerFields, VehicleFields};
use crate::service::{IssueCertificateInput, ValidationReport};

use super::{ApiError, AppState, ok_json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/certificates", post(issue_certificate))
        .route("/certificates/validate", post(validate_payload))
        .route("/certificates/{number}", get(get_certificate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateBody {
    payload: String,
}

/// POST /certificates/validate — read-side check of a scanned payload.
/// Issuance re-checks transactionally; this never consumes the code.
async fn validate_payload(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<ValidationReport>, ApiError> {
    ok_json(svc.validate_payload(&body.payload, &caller))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueBody {
    qr_value: String,
    inspection_rto: String,
    vehicle: VehicleFields,
    owner: OwnerFields,
    #[serde(default)]
    photo_refs: Vec<String>,
}

/// POST /certificates — consume a code: exactly one certificate per QR
/// value, ever, unless an admin reactivates it.
async fn issue_certificate(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<IssueBody>,
) -> Result<Json<Certificate>, ApiError> {
    ok_json(svc.issue_certificate(IssueCertificateInput {
        qr_value: body.qr_value,
        inspection_rto: body.inspection_rto,
        vehicle: body.vehicle,
        owner: body.owner,
        photo_refs: body.photo_refs,
        issued_by: Some(caller.sub),
    }))
}

async fn get_certificate(
    State(svc): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    ok_json(svc.get_certificate(&number))
}
