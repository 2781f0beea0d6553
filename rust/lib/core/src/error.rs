use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these —
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NO_DATA", "message": "..."}`.
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const CONNECTOR_FAILED: &str = "CONNECTOR_FAILED";
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
    pub const NO_DATA: &str = "NO_DATA";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used across all modules.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an
/// HTTP status code. The JSON response always includes both:
///
/// ```json
/// {"code": "NO_DATA", "message": "no responsive sources for policy 'POL-123'"}
/// ```
///
/// Per-source connector failures during aggregation are *not* errors —
/// they are folded into the response as failure entries. Only terminal
/// conditions become a `ServiceError`.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Input data is invalid (bad policy fields, bad weights). HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// A required upstream source is unavailable. HTTP 502.
    #[error("{0}")]
    Connector(String),

    /// Text generation failed with no usable fallback. HTTP 502.
    #[error("{0}")]
    Generation(String),

    /// Zero responsive sources — nothing to aggregate or score. HTTP 502.
    #[error("{0}")]
    NoData(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Connector(_) => error_code::CONNECTOR_FAILED,
            ServiceError::Generation(_) => error_code::GENERATION_FAILED,
            ServiceError::NoData(_) => error_code::NO_DATA,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Connector(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
            ServiceError::NoData(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
