//! Renewal module: priority scoring, pipeline listing and cited brief
//! generation for upcoming policy renewals.

pub mod api;
pub mod brief;
pub mod citations;
pub mod explain;
pub mod model;
pub mod scoring;
pub mod service;

use std::sync::Arc;

use axum::Router;

use copilot_core::Module;

pub use crate::scoring::ScoringConfig;
pub use crate::service::RenewalService;

pub struct RenewalModule {
    service: Arc<RenewalService>,
}

impl RenewalModule {
    pub fn new(service: Arc<RenewalService>) -> Self {
        Self { service }
    }
}

impl Module for RenewalModule {
    fn name(&self) -> &str {
        "renewal"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
