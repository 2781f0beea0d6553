use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use copilot_connector::{Policy, Snippet};

/// Weights combining the three sub-scores. Must be non-negative and sum
/// to 1.0; validated at startup, not clamped at use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub premium: f64,
    pub urgency: f64,
    pub claims: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { premium: 0.4, urgency: 0.4, claims: 0.2 }
    }
}

/// The three normalized sub-scores plus the weights that combine them.
///
/// Invariant: each sub-score is in [0,1] and
/// `total() == premium*w.premium + urgency*w.urgency + claims*w.claims`,
/// clamped to [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub premium_score: f64,
    pub urgency_score: f64,
    pub claims_score: f64,
    pub weights: ScoreWeights,
}

impl ScoreBreakdown {
    /// Final priority score: the weighted sum, clamped to [0,1].
    pub fn total(&self) -> f64 {
        let w = self.weights;
        let sum = w.premium * self.premium_score
            + w.urgency * self.urgency_score
            + w.claims * self.claims_score;
        sum.clamp(0.0, 1.0)
    }
}

/// Interpretation band for a priority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityBand {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL - Immediate action required",
            Self::High => "HIGH - Prioritize this week",
            Self::Medium => "MEDIUM - Schedule follow-up",
            Self::Low => "LOW - Monitor and plan",
        }
    }
}

/// A policy with its live score attached, as returned by `/renewals`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPolicy {
    #[serde(flatten)]
    pub policy: Policy,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub priority_explanation: String,
}

/// Sort key for the renewals list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Priority score, highest first.
    #[default]
    Score,
    /// Days to expiry, soonest first.
    Expiry,
    /// Premium at risk, largest first.
    Premium,
}

/// Filters for the renewals list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalFilter {
    #[serde(default = "default_days_window")]
    pub days_window: u32,
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
}

fn default_days_window() -> u32 {
    90
}

impl Default for RenewalFilter {
    fn default() -> Self {
        Self {
            days_window: default_days_window(),
            policy_type: None,
            assignee: None,
            sort_by: SortBy::Score,
        }
    }
}

/// Provenance pointer tying a generated claim to its source record.
/// Unresolved markers are flagged, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub resolved: bool,
}

/// A source that failed or missed the shared deadline during fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Brief generation lifecycle. `Failed` is reachable from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BriefPhase {
    Pending,
    Fetching,
    Synthesizing,
    Streaming,
    Complete,
    Failed,
}

/// The full (non-streaming) brief document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub policy: Policy,
    /// Snippets per responsive source.
    pub sources: BTreeMap<String, Vec<Snippet>>,
    /// Sources that failed or timed out during this request's fan-out.
    pub failures: Vec<SourceFailure>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    /// Raw narrative with `[SOURCE:id]` markers.
    pub narrative: String,
    /// Narrative with markers replaced by Markdown deep links.
    pub narrative_with_links: String,
    pub citations: Vec<Citation>,
    pub confidence: f64,
    pub phase: BriefPhase,
}

/// `GET /score/{policy_id}` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub policy: Policy,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub interpretation: String,
}

/// `POST /renewals` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalsResponse {
    pub renewals: Vec<ScoredPolicy>,
    pub total: usize,
    pub filters_applied: RenewalFilter,
}
