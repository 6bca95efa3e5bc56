//! Route registration — collects all module routes + system endpoints.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::auth_middleware::{self, JwtState};

/// Build the complete router with all routes.
///
/// Module routers already carry their own `/{module}/v1` prefixes, so
/// they are merged, not nested. The JWT middleware wraps everything;
/// `/health` and `/version` stay public.
pub fn build_router(jwt_state: Arc<JwtState>, module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        tracing::info!("mounting module '{}'", name);
        app = app.merge(router);
    }

    app.layer(middleware::from_fn_with_state(
        jwt_state,
        auth_middleware::auth_middleware,
    ))
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "qrseald",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
