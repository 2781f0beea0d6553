use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use copilot_core::ServiceError;

use crate::api::AppState;
use crate::model::{RenewalFilter, RenewalsResponse};

pub fn routes() -> Router<AppState> {
    Router::new().route("/renewals", post(renewals))
}

/// POST /renewals
///
/// The filter body is optional; an absent or empty body means the
/// default 90-day window sorted by score.
async fn renewals(
    State(service): State<AppState>,
    filter: Option<Json<RenewalFilter>>,
) -> Result<Json<RenewalsResponse>, ServiceError> {
    let filter = filter.map(|Json(f)| f).unwrap_or_default();
    Ok(Json(service.list_renewals(filter).await?))
}
