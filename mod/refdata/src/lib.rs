pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;
use qrseal_core::Module;

pub use model::{Dealer, Oem, Product, Rto, State};
pub use service::RefdataService;

/// Refdata Module — states, OEMs, products, RTOs, and dealers.
pub struct RefdataModule {
    service: Arc<RefdataService>,
}

impl RefdataModule {
    pub fn new(service: Arc<RefdataService>) -> Self {
        Self { service }
    }
}

impl Module for RefdataModule {
    fn name(&self) -> &str {
        "refdata"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
