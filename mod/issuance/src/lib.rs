pub mod api;
pub mod model;
pub mod payload;
pub mod service;
pub mod store;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use qrseal_core::Module;

pub use service::IssuanceService;
pub use worker::WorkerConfig;

/// Issuance Module — QR code lifecycle and batch issuance engine.
pub struct IssuanceModule {
    service: Arc<IssuanceService>,
}

impl IssuanceModule {
    pub fn new(service: Arc<IssuanceService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> Arc<IssuanceService> {
        Arc::clone(&self.service)
    }
}

impl Module for IssuanceModule {
    fn name(&self) -> &str {
        "issuance"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
