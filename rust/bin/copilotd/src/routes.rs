//! Route registration — module routes plus system endpoints.

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::info;

use copilot_core::now_rfc3339;

/// Build the complete router. Module routes already carry their own
/// state and are merged at the root, matching the public API surface.
pub fn build_router(module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        info!(module = name, "module routes mounted");
        app = app.merge(router);
    }
    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "copilotd",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": now_rfc3339(),
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "copilotd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
