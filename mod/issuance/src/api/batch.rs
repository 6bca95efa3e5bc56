use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use qrseal_core::{CallerIdentity, ListParams, ListResult};

use crate::model::Batch;
use crate::service::RequestBatchInput;
use crate::store::BatchFilters;

use super::{ApiError, AppState, ok_json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/batches", post(request_batch).get(list_batches))
        .route("/batches/{code}", get(get_batch))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestBatchBody {
    state_code: String,
    oem_code: String,
    product_code: String,
    quantity: u32,
    #[serde(default)]
    batch_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchQuery {
    #[serde(flatten)]
    params: ListParams,
    state: Option<String>,
    oem: Option<String>,
    status: Option<String>,
    #[serde(default)]
    include_ghost: bool,
}

/// POST /batches — accept an issuance request, return 202 with the
/// PENDING batch. Generation happens on the worker pool; poll the batch.
async fn request_batch(
    State(svc): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<RequestBatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    caller
        .require_scope(&body.state_code, &body.oem_code)
        .map_err(ApiError::from)?;

    let batch = svc
        .request_batch(RequestBatchInput {
            state: body.state_code,
            oem: body.oem_code,
            product: body.product_code,
            quantity: body.quantity,
            code: body.batch_code,
            requested_by: Some(caller.sub),
        })
        .map_err(ApiError::from)?;

    Ok((StatusCode::ACCEPTED, Json(batch)))
}

/// GET /batches/{code} — poll a batch's status and, once COMPLETED, its
/// serial range and artifact URL.
async fn get_batch(
    State(svc): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Batch>, ApiError> {
    ok_json(svc.get_batch(&code))
}

async fn list_batches(
    State(svc): State<AppState>,
    Query(q): Query<BatchQuery>,
) -> Result<Json<ListResult<Batch>>, ApiError> {
    let filters = BatchFilters {
        state: q.state,
        oem: q.oem,
        status: q.status,
        include_ghost: q.include_ghost,
    };
    ok_json(svc.list_batches(&q.params, &filters))
}
