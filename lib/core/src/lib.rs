pub mod auth;
pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use auth::{CallerIdentity, ROLE_ADMIN, ROLE_OEM_OPERATOR, ROLE_STATE_OFFICER};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use module::Module;
pub use types::{ListParams, ListResult, new_id, now_rfc3339};
