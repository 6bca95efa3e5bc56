//! JWT authentication middleware.
//!
//! Extracts the JWT from `Authorization: Bearer <token>`, validates it,
//! and provides a [`CallerIdentity`] to downstream handlers. The core
//! modules trust the injected identity; this middleware is the only place
//! tokens are inspected.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use qrseal_core::CallerIdentity;

/// JWT claims payload as minted by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: String,
    /// Role string (`admin`, `state_officer`, `oem_operator`, ...).
    pub role: String,
    /// State scope restriction, if any.
    #[serde(default)]
    pub state: Option<String>,
    /// OEM scope restriction, if any.
    #[serde(default)]
    pub oem: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    fn identity(&self) -> CallerIdentity {
        CallerIdentity {
            sub: self.sub.clone(),
            role: self.role.clone(),
            state: self.state.clone(),
            oem: self.oem.clone(),
        }
    }
}

/// Shared JWT configuration for the middleware.
#[derive(Clone)]
pub struct JwtState {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

/// Error type for authentication failures.
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AuthError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "missing authorization token".to_string())
            }
            AuthError::InvalidToken(e) => {
                (StatusCode::UNAUTHORIZED, format!("invalid token: {}", e))
            }
        };
        let body = serde_json::json!({ "error": msg });
        (status, axum::Json(body)).into_response()
    }
}

/// Middleware that extracts and validates the JWT.
///
/// Public paths pass through; everything else requires a valid token,
/// whose claims are stored in request extensions as a `CallerIdentity`.
pub async fn auth_middleware(
    State(jwt_state): State<Arc<JwtState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &jwt_state.decoding_key,
        &jwt_state.validation,
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    request.extensions_mut().insert(token_data.claims.identity());

    Ok(next.run(request).await)
}

/// Check if a request path is public (no auth required).
fn is_public_path(path: &str) -> bool {
    matches!(path, "/health" | "/version")
}
