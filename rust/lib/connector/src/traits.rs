use crate::error::ConnectorError;
use crate::model::{Policy, Snippet};

/// A read-only integration yielding snippets.
///
/// Implementations must be side-effect free from the service's point of
/// view: fetch, map, return. Failures are per-source and partial — the
/// aggregation layer decides what to do with them.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Source name, used for logging, failure entries and snippet tagging.
    fn name(&self) -> &'static str;

    /// Fetch lightweight metadata snippets matching `query`.
    ///
    /// Returns at most `limit` snippets, newest first where the upstream
    /// supports ordering.
    async fn fetch_snippets(&self, query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError>;
}

/// The CRM seam: the only source of [`Policy`] records.
#[async_trait::async_trait]
pub trait CrmConnector: Send + Sync {
    /// Source name, used for logging and failure entries.
    fn name(&self) -> &'static str;

    /// Fetch one policy by CRM record id.
    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy, ConnectorError>;

    /// Fetch policies expiring within the next `days_window` days.
    async fn renewal_pipeline(&self, days_window: u32) -> Result<Vec<Policy>, ConnectorError>;
}
