use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use copilot_core::ServiceError;

use crate::api::AppState;
use crate::model::ScoreResponse;

pub fn routes() -> Router<AppState> {
    Router::new().route("/score/{policy_id}", get(score))
}

/// GET /score/{policy_id}
async fn score(
    State(service): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<ScoreResponse>, ServiceError> {
    Ok(Json(service.score_policy(&policy_id).await?))
}
