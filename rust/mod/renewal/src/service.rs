//! Renewal service: scoring, pipeline listing and brief generation
//! behind one struct the HTTP handlers call into.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use copilot_connector::{Connector, ConnectorError, CrmConnector, Policy};
use copilot_core::{ServiceConfig, ServiceError};
use copilot_genai::TextGenerator;

use crate::brief::BriefPipeline;
use crate::explain::{self, fallback_explanation};
use crate::model::{
    Brief, PriorityBand, RenewalFilter, RenewalsResponse, ScoreResponse, ScoredPolicy, SortBy,
};
use crate::scoring::{ScoringConfig, score_policy};

pub struct RenewalService {
    crm: Arc<dyn CrmConnector>,
    generator: Arc<dyn TextGenerator>,
    pipeline: BriefPipeline,
    scoring: ScoringConfig,
    fetch_deadline: Duration,
    generation_timeout: Duration,
}

impl RenewalService {
    /// Build the service. Fails fast on an invalid scoring configuration.
    pub fn new(
        crm: Arc<dyn CrmConnector>,
        connectors: Vec<Arc<dyn Connector>>,
        generator: Arc<dyn TextGenerator>,
        scoring: ScoringConfig,
        config: &ServiceConfig,
    ) -> Result<Self, ServiceError> {
        scoring.validate()?;
        let pipeline = BriefPipeline::new(
            Arc::clone(&crm),
            connectors,
            Arc::clone(&generator),
            scoring,
            config,
        );
        Ok(Self {
            crm,
            generator,
            pipeline,
            scoring,
            fetch_deadline: config.fetch_deadline(),
            generation_timeout: config.generation_timeout(),
        })
    }

    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy, ServiceError> {
        match tokio::time::timeout(self.fetch_deadline, self.crm.fetch_policy(policy_id)).await {
            Ok(Ok(policy)) => Ok(policy),
            Ok(Err(e)) => Err(map_crm_error(policy_id, e)),
            Err(_) => Err(ServiceError::Connector(format!(
                "{} timed out after {}ms",
                self.crm.name(),
                self.fetch_deadline.as_millis()
            ))),
        }
    }

    /// Score one policy and explain the result.
    pub async fn score_policy(&self, policy_id: &str) -> Result<ScoreResponse, ServiceError> {
        let policy = self.fetch_policy(policy_id).await?;
        let breakdown = score_policy(&policy, &self.scoring)?;
        let score = breakdown.total();
        debug!(policy = policy_id, score, "policy scored");

        let rationale = explain::explain(
            self.generator.as_ref(),
            &policy,
            &breakdown,
            self.generation_timeout,
        )
        .await;
        let interpretation =
            explain::interpretation(PriorityBand::from_score(score), &rationale);

        Ok(ScoreResponse { policy, score, breakdown, interpretation })
    }

    /// List upcoming renewals, scored, filtered and sorted.
    ///
    /// Explanations here are always the deterministic template; one
    /// generation call per listed policy would be too slow and adds
    /// nothing the score endpoint does not already offer.
    pub async fn list_renewals(&self, filter: RenewalFilter) -> Result<RenewalsResponse, ServiceError> {
        let policies = match tokio::time::timeout(
            self.fetch_deadline,
            self.crm.renewal_pipeline(filter.days_window),
        )
        .await
        {
            Ok(Ok(policies)) => policies,
            Ok(Err(e)) => {
                return Err(ServiceError::Connector(format!("crm pipeline fetch failed: {e}")));
            }
            Err(_) => {
                return Err(ServiceError::Connector(format!(
                    "{} timed out after {}ms",
                    self.crm.name(),
                    self.fetch_deadline.as_millis()
                )));
            }
        };

        let mut renewals = Vec::with_capacity(policies.len());
        for policy in policies {
            // The CRM may over-return; enforce the filters here.
            if policy.days_to_expiry > filter.days_window {
                continue;
            }
            if let Some(t) = &filter.policy_type {
                if policy.policy_type.as_deref() != Some(t.as_str()) {
                    continue;
                }
            }
            if let Some(a) = &filter.assignee {
                if policy.assignee.as_deref() != Some(a.as_str()) {
                    continue;
                }
            }

            let breakdown = score_policy(&policy, &self.scoring)?;
            let priority_explanation = fallback_explanation(&policy, &breakdown);
            renewals.push(ScoredPolicy {
                score: breakdown.total(),
                score_breakdown: breakdown,
                priority_explanation,
                policy,
            });
        }

        match filter.sort_by {
            SortBy::Score => {
                renewals.sort_by(|a, b| b.score.total_cmp(&a.score));
            }
            SortBy::Expiry => {
                renewals.sort_by_key(|r| r.policy.days_to_expiry);
            }
            SortBy::Premium => {
                renewals.sort_by(|a, b| {
                    b.policy.premium_at_risk.total_cmp(&a.policy.premium_at_risk)
                });
            }
        }

        info!(
            total = renewals.len(),
            days_window = filter.days_window,
            "renewal pipeline listed"
        );
        let total = renewals.len();
        Ok(RenewalsResponse { renewals, total, filters_applied: filter })
    }

    /// Generate the full brief document.
    pub async fn brief(&self, policy_id: &str) -> Result<Brief, ServiceError> {
        self.pipeline.generate(policy_id).await
    }

    /// Generate the brief as a chunk stream.
    pub async fn stream_brief(&self, policy_id: &str) -> Result<mpsc::Receiver<String>, ServiceError> {
        self.pipeline.stream(policy_id).await
    }
}

fn map_crm_error(context: &str, e: ConnectorError) -> ServiceError {
    if e.is_not_found() {
        ServiceError::NotFound(format!("policy '{context}' not found"))
    } else {
        ServiceError::Connector(format!("crm fetch failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_connector::fixture::{FailingCrm, StaticCrm};
    use copilot_genai::fixture::{NullGenerator, StaticGenerator};

    fn service(generator: Arc<dyn TextGenerator>) -> RenewalService {
        RenewalService::new(
            Arc::new(StaticCrm::demo()),
            vec![],
            generator,
            ScoringConfig::default(),
            &ServiceConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn score_endpoint_shape() {
        let svc = service(Arc::new(StaticGenerator::new("Premium-led urgency.")));
        let resp = svc.score_policy("POL-123").await.unwrap();
        assert_eq!(resp.policy.id, "POL-123");
        assert!((0.0..=1.0).contains(&resp.score));
        assert!(resp.interpretation.contains("Premium-led urgency."));
        // Band label leads the interpretation.
        assert!(resp.interpretation.starts_with(PriorityBand::from_score(resp.score).label()));
    }

    #[tokio::test]
    async fn score_unknown_policy_is_not_found() {
        let svc = service(Arc::new(NullGenerator));
        let err = svc.score_policy("POL-000").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn score_crm_failure_is_connector_error() {
        let svc = RenewalService::new(
            Arc::new(FailingCrm),
            vec![],
            Arc::new(NullGenerator),
            ScoringConfig::default(),
            &ServiceConfig::default(),
        )
        .unwrap();
        let err = svc.score_policy("POL-123").await.unwrap_err();
        assert!(matches!(err, ServiceError::Connector(_)));
    }

    #[tokio::test]
    async fn renewals_sorted_by_score_by_default() {
        let svc = service(Arc::new(NullGenerator));
        let resp = svc.list_renewals(RenewalFilter::default()).await.unwrap();
        assert_eq!(resp.total, 3);
        for pair in resp.renewals.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(resp.renewals.iter().all(|r| !r.priority_explanation.is_empty()));
    }

    #[tokio::test]
    async fn renewals_window_and_type_filters() {
        let svc = service(Arc::new(NullGenerator));

        let resp = svc
            .list_renewals(RenewalFilter { days_window: 60, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(resp.total, 2);

        let resp = svc
            .list_renewals(RenewalFilter {
                policy_type: Some("Cyber Liability".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.total, 1);
        assert_eq!(resp.renewals[0].policy.id, "POL-789");
    }

    #[tokio::test]
    async fn renewals_assignee_filter_and_expiry_sort() {
        let svc = service(Arc::new(NullGenerator));
        let resp = svc
            .list_renewals(RenewalFilter {
                assignee: Some("john.broker@company.com".into()),
                sort_by: SortBy::Expiry,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(resp.renewals[0].policy.id, "POL-123");
        assert_eq!(resp.renewals[1].policy.id, "POL-789");
    }

    #[tokio::test]
    async fn renewals_premium_sort() {
        let svc = service(Arc::new(NullGenerator));
        let resp = svc
            .list_renewals(RenewalFilter { sort_by: SortBy::Premium, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(resp.renewals[0].policy.id, "POL-789");
    }

    #[test]
    fn invalid_weights_refuse_construction() {
        let mut scoring = ScoringConfig::default();
        scoring.weights.premium = 0.9;
        let result = RenewalService::new(
            Arc::new(StaticCrm::demo()),
            vec![],
            Arc::new(NullGenerator),
            scoring,
            &ServiceConfig::default(),
        );
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
