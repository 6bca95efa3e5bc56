//! Administrative correction flows: ghost reprints, bulk replacement,
//! reactivation.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use qrseal_core::CallerIdentity;

use crate::service::{GhostRequestInput, ReplacementInput, ReplacementResult};

use super::{ApiError, AppState, ok_json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ghosts", post(request_ghost))
        .route("/replacements", post(bulk_replacement))
        .route("/reactivations", post(reactivate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhostBody {
    state_code: String,
    oem_code: String,
    product_code: String,
    start_serial: i64,
    quantity: u32,
}

/// POST /ghosts — regenerate a reprint batch over used serials. Runs
/// through the worker pool like a live batch; returns 202.
async fn request_ghost(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<GhostBody>,
) -> Result<impl IntoResponse, ApiError> {
    caller
        .require_scope(&body.state_code, &body.oem_code)
        .map_err(ApiError::from)?;

    let batch = svc
        .request_ghost_batch(GhostRequestInput {
            state: body.state_code,
            oem: body.oem_code,
            product: body.product_code,
            start_serial: body.start_serial,
            quantity: body.quantity,
            requested_by: Some(caller.sub),
        })
        .map_err(ApiError::from)?;

    Ok((StatusCode::ACCEPTED, Json(batch)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplacementBody {
    state_code: String,
    oem_code: String,
    serials: Vec<i64>,
}

/// POST /replacements — one reprint artifact over still-unused serials.
async fn bulk_replacement(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<ReplacementBody>,
) -> Result<Json<ReplacementResult>, ApiError> {
    caller
        .require_scope(&body.state_code, &body.oem_code)
        .map_err(ApiError::from)?;

    ok_json(svc.bulk_replacement(ReplacementInput {
        state: body.state_code,
        oem: body.oem_code,
        serials: body.serials,
        requested_by: Some(caller.sub),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactivateBody {
    state_code: String,
    oem_code: String,
    serial_number: i64,
}

/// POST /reactivations — admin-only undo of a consumption.
async fn reactivate(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<ReactivateBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    caller.require_admin().map_err(ApiError::from)?;

    svc.reactivate(&body.state_code, &body.oem_code, body.serial_number)
        .map_err(ApiError::from)?;

    Ok(Json(serde_json::json!({"success": true})))
}
