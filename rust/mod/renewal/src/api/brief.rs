use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use copilot_core::ServiceError;

use crate::api::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/brief/{policy_id}", get(brief))
}

#[derive(Debug, Deserialize)]
struct BriefQuery {
    /// Stream the brief as chunked text (default) or return the full
    /// JSON document with `stream=false`.
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

/// GET /brief/{policy_id}?stream=
async fn brief(
    State(service): State<AppState>,
    Path(policy_id): Path<String>,
    Query(query): Query<BriefQuery>,
) -> Result<Response, ServiceError> {
    if !query.stream {
        return Ok(Json(service.brief(&policy_id).await?).into_response());
    }

    // Fetch and scoring run before the response starts, so failures
    // still surface as proper HTTP errors rather than a broken stream.
    let rx = service.stream_brief(&policy_id).await?;
    let headers = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];
    Ok((headers, Body::from_stream(ChunkBody(rx))).into_response())
}

/// Adapts the pipeline's chunk channel to a body stream. Dropping the
/// body (client disconnect) drops the receiver, which stops the
/// producer.
struct ChunkBody(mpsc::Receiver<String>);

impl Stream for ChunkBody {
    type Item = Result<Bytes, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx).map(|chunk| chunk.map(|s| Ok(Bytes::from(s))))
    }
}
