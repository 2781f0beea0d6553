use thiserror::Error;

/// Text-generation failure.
///
/// Callers never retry inside a request; [`GenerationError::is_retryable`]
/// only tells the caller whether re-issuing the whole request later could
/// help, versus a terminal condition like a filtered prompt.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// No API key configured. Pipelines fall back silently.
    #[error("generation not configured: {0}")]
    NotConfigured(String),

    /// Quota exhausted (HTTP 429).
    #[error("rate limited")]
    RateLimited,

    /// The prompt or response was blocked by a safety filter.
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// Upstream API error.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("decode: {0}")]
    Decode(String),

    /// The call exceeded its timeout.
    #[error("timed out")]
    Timeout,
}

impl GenerationError {
    /// Whether re-issuing the whole request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited | GenerationError::Timeout => true,
            GenerationError::Network(_) => true,
            GenerationError::Api { status, .. } => *status >= 500,
            GenerationError::NotConfigured(_)
            | GenerationError::ContentFiltered(_)
            | GenerationError::Decode(_) => false,
        }
    }
}
