pub mod admin;
pub mod batch;
pub mod certificate;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use qrseal_core::ServiceError;

use crate::service::IssuanceService;

/// Shared application state.
pub type AppState = Arc<IssuanceService>;

/// Build the issuance API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/issuance/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(batch::routes())
        .merge(certificate::routes())
        .merge(admin::routes())
}

/// Standard API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    /// Stable machine-readable error code; tells the client whether a
    /// retry can succeed.
    pub error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "code": self.code,
                "errorCode": self.error_code,
                "message": self.message,
            }
        }));
        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError {
            code: err.status_code().as_u16(),
            error_code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// Wrap a Result<T, ServiceError> into an API response.
pub(crate) fn ok_json<T: Serialize>(result: Result<T, ServiceError>) -> Result<Json<T>, ApiError> {
    result.map(Json).map_err(ApiError::from)
}
