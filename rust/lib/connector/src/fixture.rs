//! Trivial connector implementations for tests and demo mode.
//!
//! Demo mode stands in for unconfigured live connectors so the full
//! pipeline can run end to end without any credentials.

use std::time::Duration;

use crate::error::ConnectorError;
use crate::model::{Policy, Snippet};
use crate::traits::{Connector, CrmConnector};

/// Returns a fixed snippet list on every fetch.
pub struct StaticConnector {
    name: &'static str,
    snippets: Vec<Snippet>,
}

impl StaticConnector {
    pub fn new(name: &'static str, snippets: Vec<Snippet>) -> Self {
        Self { name, snippets }
    }
}

#[async_trait::async_trait]
impl Connector for StaticConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_snippets(&self, _query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        Ok(self.snippets.iter().take(limit).cloned().collect())
    }
}

/// Fails every fetch with the given message.
pub struct FailingConnector {
    name: &'static str,
    message: String,
}

impl FailingConnector {
    pub fn new(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, message: message.into() }
    }
}

#[async_trait::async_trait]
impl Connector for FailingConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_snippets(&self, _query: &str, _limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        Err(ConnectorError::Http { status: 503, message: self.message.clone() })
    }
}

/// Sleeps before answering — for exercising the shared fan-out deadline.
pub struct SlowConnector {
    name: &'static str,
    delay: Duration,
    snippets: Vec<Snippet>,
}

impl SlowConnector {
    pub fn new(name: &'static str, delay: Duration, snippets: Vec<Snippet>) -> Self {
        Self { name, delay, snippets }
    }
}

#[async_trait::async_trait]
impl Connector for SlowConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_snippets(&self, _query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.snippets.iter().take(limit).cloned().collect())
    }
}

/// In-memory CRM backed by a fixed policy list.
pub struct StaticCrm {
    policies: Vec<Policy>,
}

impl StaticCrm {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    /// The demo book of business used when no CRM is configured.
    pub fn demo() -> Self {
        Self::new(demo_policies())
    }
}

#[async_trait::async_trait]
impl CrmConnector for StaticCrm {
    fn name(&self) -> &'static str {
        "static_crm"
    }

    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy, ConnectorError> {
        self.policies
            .iter()
            .find(|p| p.id == policy_id)
            .cloned()
            .ok_or(ConnectorError::Http {
                status: 404,
                message: format!("policy '{policy_id}' not found"),
            })
    }

    async fn renewal_pipeline(&self, days_window: u32) -> Result<Vec<Policy>, ConnectorError> {
        Ok(self
            .policies
            .iter()
            .filter(|p| p.days_to_expiry <= days_window)
            .cloned()
            .collect())
    }
}

/// An unreachable CRM — every call fails.
pub struct FailingCrm;

#[async_trait::async_trait]
impl CrmConnector for FailingCrm {
    fn name(&self) -> &'static str {
        "failing_crm"
    }

    async fn fetch_policy(&self, _policy_id: &str) -> Result<Policy, ConnectorError> {
        Err(ConnectorError::Http { status: 503, message: "crm unavailable".into() })
    }

    async fn renewal_pipeline(&self, _days_window: u32) -> Result<Vec<Policy>, ConnectorError> {
        Err(ConnectorError::Http { status: 503, message: "crm unavailable".into() })
    }
}

/// Demo renewals matching the shape of a real CRM pipeline.
pub fn demo_policies() -> Vec<Policy> {
    vec![
        Policy {
            id: "POL-123".into(),
            policy_number: "POL-123".into(),
            client_name: "ACME Corporation".into(),
            premium_at_risk: 125_000.0,
            expiry_date: "2026-01-15".into(),
            days_to_expiry: 43,
            claims_frequency: 1,
            policy_type: Some("Commercial Property".into()),
            assignee: Some("john.broker@company.com".into()),
            link: Some("https://crm.example.com/policy/POL-123".into()),
        },
        Policy {
            id: "POL-456".into(),
            policy_number: "POL-456".into(),
            client_name: "Smith Industries".into(),
            premium_at_risk: 75_000.0,
            expiry_date: "2026-01-30".into(),
            days_to_expiry: 58,
            claims_frequency: 3,
            policy_type: Some("General Liability".into()),
            assignee: Some("jane.broker@company.com".into()),
            link: Some("https://crm.example.com/policy/POL-456".into()),
        },
        Policy {
            id: "POL-789".into(),
            policy_number: "POL-789".into(),
            client_name: "TechStart Inc".into(),
            premium_at_risk: 250_000.0,
            expiry_date: "2026-02-28".into(),
            days_to_expiry: 87,
            claims_frequency: 0,
            policy_type: Some("Cyber Liability".into()),
            assignee: Some("john.broker@company.com".into()),
            link: Some("https://crm.example.com/policy/POL-789".into()),
        },
    ]
}

/// Demo mail snippets.
pub fn demo_mail_snippets() -> Vec<Snippet> {
    vec![Snippet {
        id: "msg-1".into(),
        source: "graph_mail".into(),
        subject: "Re: ACME renewal terms".into(),
        timestamp: Some("2025-11-25T16:12:00Z".into()),
        snippet: "Attached the updated schedule of values for the renewal.".into(),
        link: Some("https://outlook.office.com/mail/item/msg-1".into()),
        metadata: Default::default(),
    }]
}

/// Demo meeting snippets.
pub fn demo_meeting_snippets() -> Vec<Snippet> {
    vec![
        Snippet {
            id: "mtg-1".into(),
            source: "graph_calendar".into(),
            subject: "Renewal Discussion - ACME Corp".into(),
            timestamp: Some("2025-11-20T09:00:00Z".into()),
            snippet: "Discussed coverage options, client interested in increasing limits".into(),
            link: Some("https://outlook.office.com/calendar/item/mtg-1".into()),
            metadata: Default::default(),
        },
        Snippet {
            id: "mtg-2".into(),
            source: "graph_calendar".into(),
            subject: "Quarterly Review - ACME".into(),
            timestamp: Some("2025-09-15T14:00:00Z".into()),
            snippet: "Reviewed claims history, no major concerns".into(),
            link: Some("https://outlook.office.com/calendar/item/mtg-2".into()),
            metadata: Default::default(),
        },
    ]
}

/// Demo chat snippets.
pub fn demo_chat_snippets() -> Vec<Snippet> {
    vec![Snippet {
        id: "chat-1".into(),
        source: "teams_chat".into(),
        subject: "Quick question about ACME renewal".into(),
        timestamp: Some("2025-11-29T08:30:00Z".into()),
        snippet: "Hey, the ACME renewal is coming up - do we have the latest financials?".into(),
        link: Some("https://teams.microsoft.com/l/message/19:demo/chat-1".into()),
        metadata: Default::default(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_crm_lookup() {
        let crm = StaticCrm::demo();
        let p = crm.fetch_policy("POL-123").await.unwrap();
        assert_eq!(p.client_name, "ACME Corporation");

        let err = crm.fetch_policy("POL-999").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn static_crm_pipeline_windows() {
        let crm = StaticCrm::demo();
        assert_eq!(crm.renewal_pipeline(90).await.unwrap().len(), 3);
        assert_eq!(crm.renewal_pipeline(60).await.unwrap().len(), 2);
        assert_eq!(crm.renewal_pipeline(30).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn static_connector_respects_limit() {
        let c = StaticConnector::new("graph_calendar", demo_meeting_snippets());
        assert_eq!(c.fetch_snippets("acme", 1).await.unwrap().len(), 1);
        assert_eq!(c.fetch_snippets("acme", 5).await.unwrap().len(), 2);
    }
}
