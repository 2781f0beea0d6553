use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A unit of raw connector output: minimal excerpt + metadata.
///
/// Snippets exist only for the duration of one aggregation request and
/// are never persisted. The `id` is the upstream record's identifier and
/// doubles as the citation key (`[SOURCE:id]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Upstream record id — citation key.
    pub id: String,

    /// Connector name this snippet came from.
    pub source: String,

    /// Short subject/title.
    pub subject: String,

    /// RFC 3339 timestamp of the upstream record, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Short text excerpt.
    pub snippet: String,

    /// Deep link to the original record (provenance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Free-form metadata (attendees, sender, stage, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A policy renewal record as fetched from the CRM.
///
/// Immutable per request; fetched fresh each time. Integer fields are
/// non-negative by construction so only `premium_at_risk` needs range
/// validation before scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// CRM record id.
    pub id: String,

    pub policy_number: String,

    pub client_name: String,

    /// Premium amount at risk if the renewal is lost.
    pub premium_at_risk: f64,

    /// Expiry date as an RFC 3339 date (`YYYY-MM-DD`).
    pub expiry_date: String,

    /// Days until expiry, floored at zero by the connector.
    pub days_to_expiry: u32,

    /// Number of claims filed during the policy term.
    #[serde(default)]
    pub claims_frequency: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Deep link to the CRM record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_json_roundtrip() {
        let s = Snippet {
            id: "msg-1".into(),
            source: "graph_mail".into(),
            subject: "Renewal Discussion - ACME Corp".into(),
            timestamp: Some("2025-11-20T09:00:00Z".into()),
            snippet: "Discussed coverage options".into(),
            link: Some("https://outlook.office.com/mail/item/msg-1".into()),
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Snippet = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
        // Empty metadata is elided on the wire.
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn policy_json_roundtrip() {
        let p = Policy {
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
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Policy = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert!(json.contains("premiumAtRisk"));
    }

    #[test]
    fn policy_optional_fields_default() {
        let json = r#"{
            "id": "POL-7",
            "policyNumber": "POL-7",
            "clientName": "Smith Industries",
            "premiumAtRisk": 75000.0,
            "expiryDate": "2026-01-30",
            "daysToExpiry": 58
        }"#;
        let p: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(p.claims_frequency, 0);
        assert!(p.policy_type.is_none());
        assert!(p.link.is_none());
    }
}
