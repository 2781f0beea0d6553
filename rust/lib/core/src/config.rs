use std::time::Duration;

/// Common runtime configuration shared by all services.
///
/// Each service binary resolves these from its config file and passes
/// them through to the pipeline. There is no storage configuration: the
/// service holds no business data beyond a single request's lifetime.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address for the HTTP server.
    pub listen: String,

    /// Shared deadline for one aggregation fan-out, in milliseconds.
    /// Sources that miss it become failure entries, not errors.
    pub fetch_deadline_ms: u64,

    /// Maximum snippets requested from each connector.
    pub snippet_limit: usize,

    /// Timeout for one explanation/generation call, in milliseconds.
    /// On expiry the templated fallback is used.
    pub generation_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            fetch_deadline_ms: 3000,
            snippet_limit: 5,
            generation_timeout_ms: 20_000,
        }
    }
}

impl ServiceConfig {
    /// The fan-out deadline as a [`Duration`].
    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_millis(self.fetch_deadline_ms)
    }

    /// The generation timeout as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}
