pub mod brief;
pub mod renewals;
pub mod score;

use std::sync::Arc;

use axum::Router;

use crate::service::RenewalService;

pub type AppState = Arc<RenewalService>;

/// All renewal routes with state applied.
pub fn router(service: AppState) -> Router {
    Router::new()
        .merge(score::routes())
        .merge(renewals::routes())
        .merge(brief::routes())
        .with_state(service)
}
