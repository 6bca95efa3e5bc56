//! Caller identity, as supplied by the external authentication layer.
//!
//! The server binary validates the bearer token and injects a
//! [`CallerIdentity`] into request extensions; module handlers trust it.
//! The core never authenticates — it only consumes identity and role.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Role with full administrative trust. Required for destructive
/// correction flows (reactivation).
pub const ROLE_ADMIN: &str = "admin";

/// Role for state-level transport officers.
pub const ROLE_STATE_OFFICER: &str = "state_officer";

/// Role for OEM fitment operators (the usual scanning/issuing callers).
pub const ROLE_OEM_OPERATOR: &str = "oem_operator";

/// Authenticated caller, extracted from a validated token.
///
/// `state` / `oem` restrict the caller to one scope; `None` means
/// unrestricted on that axis (admins and state-agnostic service users).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Subject: user id.
    pub sub: String,

    /// Role string (see the `ROLE_*` constants).
    pub role: String,

    /// State the caller is confined to, if any.
    #[serde(default)]
    pub state: Option<String>,

    /// OEM the caller is confined to, if any.
    #[serde(default)]
    pub oem: Option<String>,
}

impl CallerIdentity {
    /// An unrestricted administrative identity.
    pub fn admin(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            role: ROLE_ADMIN.to_string(),
            state: None,
            oem: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Whether the caller may act on the given (state, oem) scope.
    pub fn allows_scope(&self, state: &str, oem: &str) -> bool {
        let state_ok = self.state.as_deref().is_none_or(|s| s == state);
        let oem_ok = self.oem.as_deref().is_none_or(|o| o == oem);
        state_ok && oem_ok
    }

    /// Error unless the caller holds the admin role.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "user {} lacks the {} role",
                self.sub, ROLE_ADMIN
            )))
        }
    }

    /// Error unless the caller may act on the given (state, oem) scope.
    pub fn require_scope(&self, state: &str, oem: &str) -> Result<(), ServiceError> {
        if self.allows_scope(state, oem) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "user {} may not act on scope {}/{}",
                self.sub, state, oem
            )))
        }
    }
}
