use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use qrseal_core::ServiceError;

use crate::model::{Dealer, Oem, Product, Rto, State};
use crate::service::RefdataService;

/// Shared application state.
pub type AppState = Arc<RefdataService>;

/// Build the refdata API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/refdata/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/states", get(list_states).post(upsert_state))
        .route("/states/{code}", get(get_state).delete(delete_state))
        .route("/oems", get(list_oems).post(upsert_oem))
        .route("/oems/{code}", get(get_oem).delete(delete_oem))
        .route("/products", get(list_products).post(upsert_product))
        .route("/products/{code}", get(get_product).delete(delete_product))
        .route("/rtos", get(list_rtos).post(upsert_rto))
        .route("/rtos/{code}", get(get_rto).delete(delete_rto))
        .route("/dealers", get(list_dealers).post(upsert_dealer))
        .route("/dealers/{code}", get(get_dealer).delete(delete_dealer))
}

/// Standard API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "code": self.code,
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
            message: err.to_string(),
        }
    }
}

fn ok_json<T: Serialize>(result: Result<T, ServiceError>) -> Result<Json<T>, ApiError> {
    result.map(Json).map_err(ApiError::from)
}

fn ok_upsert(result: Result<(), ServiceError>) -> Result<Json<serde_json::Value>, ApiError> {
    result
        .map(|_| Json(serde_json::json!({"ok": true})))
        .map_err(ApiError::from)
}

// ── States ──

async fn list_states(AxumState(svc): AxumState<AppState>) -> Result<Json<Vec<State>>, ApiError> {
    ok_json(svc.list_states())
}

async fn upsert_state(
    AxumState(svc): AxumState<AppState>,
    Json(body): Json<State>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.upsert_state(&body))
}

async fn get_state(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<State>, ApiError> {
    ok_json(svc.get_state(&code))
}

async fn delete_state(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.delete_state(&code))
}

// ── OEMs ──

async fn list_oems(AxumState(svc): AxumState<AppState>) -> Result<Json<Vec<Oem>>, ApiError> {
    ok_json(svc.list_oems())
}

async fn upsert_oem(
    AxumState(svc): AxumState<AppState>,
    Json(body): Json<Oem>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.upsert_oem(&body))
}

async fn get_oem(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Oem>, ApiError> {
    ok_json(svc.get_oem(&code))
}

async fn delete_oem(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.delete_oem(&code))
}

// ── Products ──

async fn list_products(
    AxumState(svc): AxumState<AppState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    ok_json(svc.list_products())
}

async fn upsert_product(
    AxumState(svc): AxumState<AppState>,
    Json(body): Json<Product>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.upsert_product(&body))
}

async fn get_product(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Product>, ApiError> {
    ok_json(svc.get_product(&code))
}

async fn delete_product(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.delete_product(&code))
}

// ── RTOs ──

async fn list_rtos(AxumState(svc): AxumState<AppState>) -> Result<Json<Vec<Rto>>, ApiError> {
    ok_json(svc.list_rtos())
}

async fn upsert_rto(
    AxumState(svc): AxumState<AppState>,
    Json(body): Json<Rto>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.upsert_rto(&body))
}

async fn get_rto(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Rto>, ApiError> {
    ok_json(svc.get_rto(&code))
}

async fn delete_rto(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.delete_rto(&code))
}

// ── Dealers ──

async fn list_dealers(
    AxumState(svc): AxumState<AppState>,
) -> Result<Json<Vec<Dealer>>, ApiError> {
    ok_json(svc.list_dealers())
}

async fn upsert_dealer(
    AxumState(svc): AxumState<AppState>,
    Json(body): Json<Dealer>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.upsert_dealer(&body))
}

async fn get_dealer(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Dealer>, ApiError> {
    ok_json(svc.get_dealer(&code))
}

async fn delete_dealer(
    AxumState(svc): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ok_upsert(svc.delete_dealer(&code))
}
