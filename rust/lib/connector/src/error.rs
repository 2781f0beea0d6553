use thiserror::Error;

/// Per-source connector error.
///
/// Connector failures are partial by design: the aggregation pipeline
/// records them as failure entries and proceeds with whatever other
/// sources returned. They never abort a whole request on their own.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// No credentials configured for this source.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Credentials present but rejected (expired/invalid token).
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Upstream returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("decode: {0}")]
    Decode(String),

    /// The source missed the shared aggregation deadline.
    #[error("timed out")]
    Timeout,
}

impl ConnectorError {
    /// Whether the upstream record simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectorError::Http { status: 404, .. })
    }
}
