//! Deterministic renewal priority scoring.
//!
//! Pure functions of the policy fields and the scoring configuration:
//! same inputs, bit-identical outputs. No clock, no randomness, no I/O.

use copilot_connector::Policy;
use copilot_core::ServiceError;

use crate::model::{ScoreBreakdown, ScoreWeights};

/// Scoring knobs. Defaults match the standard book-of-business tuning;
/// operators may override weights per deployment, caps rarely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Premium at which the premium sub-score saturates at 1.0.
    pub premium_cap: f64,
    /// Claims count at which the claims sub-score saturates at 1.0.
    pub claims_cap: f64,
    /// Days-to-expiry beyond which urgency is exactly 0.0.
    pub urgency_horizon_days: u32,
    /// Exponential decay constant for the urgency curve.
    pub urgency_decay: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            premium_cap: 250_000.0,
            claims_cap: 10.0,
            urgency_horizon_days: 90,
            urgency_decay: 0.05,
        }
    }
}

impl ScoringConfig {
    /// Check the configuration once at startup. Weights must be
    /// non-negative and sum to 1.0 (within 1e-9); caps and decay must be
    /// positive.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let w = self.weights;
        if w.premium < 0.0 || w.urgency < 0.0 || w.claims < 0.0 {
            return Err(ServiceError::Validation("score weights must be non-negative".into()));
        }
        let sum = w.premium + w.urgency + w.claims;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ServiceError::Validation(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        if !(self.premium_cap > 0.0) {
            return Err(ServiceError::Validation("premium cap must be positive".into()));
        }
        if !(self.claims_cap > 0.0) {
            return Err(ServiceError::Validation("claims cap must be positive".into()));
        }
        if self.urgency_horizon_days == 0 {
            return Err(ServiceError::Validation("urgency horizon must be positive".into()));
        }
        if !(self.urgency_decay > 0.0) {
            return Err(ServiceError::Validation("urgency decay must be positive".into()));
        }
        Ok(())
    }

    /// Urgency sub-score for `days` until expiry.
    ///
    /// 1.0 at zero days, exponentially rising as expiry approaches, and
    /// exactly 0.0 at or beyond the horizon.
    pub fn urgency_score(&self, days: u32) -> f64 {
        if days == 0 {
            return 1.0;
        }
        if days >= self.urgency_horizon_days {
            return 0.0;
        }
        let remaining = f64::from(self.urgency_horizon_days - days);
        1.0 - (-self.urgency_decay * remaining).exp()
    }
}

/// Score one policy.
///
/// Fails with [`ServiceError::Validation`] on a negative or non-finite
/// premium; `days_to_expiry` and `claims_frequency` are non-negative by
/// construction.
pub fn score_policy(policy: &Policy, config: &ScoringConfig) -> Result<ScoreBreakdown, ServiceError> {
    if !policy.premium_at_risk.is_finite() {
        return Err(ServiceError::Validation(format!(
            "policy '{}' has non-finite premium",
            policy.id
        )));
    }
    if policy.premium_at_risk < 0.0 {
        return Err(ServiceError::Validation(format!(
            "policy '{}' has negative premium {}",
            policy.id, policy.premium_at_risk
        )));
    }

    let premium_score = (policy.premium_at_risk / config.premium_cap).min(1.0);
    let urgency_score = config.urgency_score(policy.days_to_expiry);
    let claims_score = (f64::from(policy.claims_frequency) / config.claims_cap).min(1.0);

    Ok(ScoreBreakdown {
        premium_score,
        urgency_score,
        claims_score,
        weights: config.weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_connector::fixture::demo_policies;

    fn policy(premium: f64, days: u32, claims: u32) -> Policy {
        Policy {
            id: "POL-T".into(),
            policy_number: "POL-T".into(),
            client_name: "Test Client".into(),
            premium_at_risk: premium,
            expiry_date: "2026-03-01".into(),
            days_to_expiry: days,
            claims_frequency: claims,
            policy_type: None,
            assignee: None,
            link: None,
        }
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let cfg = ScoringConfig::default();
        for premium in [0.0, 1.0, 125_000.0, 250_000.0, 9_000_000.0] {
            for days in [0, 1, 10, 45, 89, 90, 365] {
                for claims in [0, 1, 5, 10, 50] {
                    let b = score_policy(&policy(premium, days, claims), &cfg).unwrap();
                    for s in [b.premium_score, b.urgency_score, b.claims_score, b.total()] {
                        assert!((0.0..=1.0).contains(&s), "score {s} out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn total_is_weighted_sum_of_breakdown() {
        let cfg = ScoringConfig::default();
        let b = score_policy(&policy(125_000.0, 43, 1), &cfg).unwrap();
        let expected =
            0.4 * b.premium_score + 0.4 * b.urgency_score + 0.2 * b.claims_score;
        assert_eq!(b.total(), expected);
    }

    #[test]
    fn scoring_is_deterministic() {
        let cfg = ScoringConfig::default();
        let p = policy(87_654.32, 37, 4);
        let a = score_policy(&p, &cfg).unwrap();
        let b = score_policy(&p, &cfg).unwrap();
        assert_eq!(a.total().to_bits(), b.total().to_bits());
        assert_eq!(a.urgency_score.to_bits(), b.urgency_score.to_bits());
    }

    #[test]
    fn urgency_curve_endpoints() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.urgency_score(0), 1.0);
        assert_eq!(cfg.urgency_score(90), 0.0);
        assert_eq!(cfg.urgency_score(365), 0.0);
    }

    #[test]
    fn urgency_curve_shape() {
        let cfg = ScoringConfig::default();
        // 10 days out: 1 - exp(-0.05 * 80) ≈ 0.982
        assert!(cfg.urgency_score(10) > 0.8);
        // 80 days out: 1 - exp(-0.05 * 10) ≈ 0.393
        assert!(cfg.urgency_score(80) < 0.5);
        // Strictly increasing as expiry approaches.
        for days in 1..90 {
            assert!(cfg.urgency_score(days) > cfg.urgency_score(days + 1));
        }
    }

    #[test]
    fn premium_and_claims_saturate_at_cap() {
        let cfg = ScoringConfig::default();
        let b = score_policy(&policy(1_000_000.0, 45, 25), &cfg).unwrap();
        assert_eq!(b.premium_score, 1.0);
        assert_eq!(b.claims_score, 1.0);
    }

    #[test]
    fn invalid_premium_rejected() {
        let cfg = ScoringConfig::default();
        assert!(matches!(
            score_policy(&policy(-1.0, 45, 0), &cfg),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            score_policy(&policy(f64::NAN, 45, 0), &cfg),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn weight_validation() {
        let mut cfg = ScoringConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.weights = ScoreWeights { premium: 0.5, urgency: 0.35, claims: 0.15 };
        assert!(cfg.validate().is_ok());

        cfg.weights = ScoreWeights { premium: 0.5, urgency: 0.5, claims: 0.5 };
        assert!(matches!(cfg.validate(), Err(ServiceError::Validation(_))));

        cfg.weights = ScoreWeights { premium: 1.2, urgency: -0.2, claims: 0.0 };
        assert!(matches!(cfg.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn demo_book_ranks_acme_above_techstart() {
        // POL-123 expires soonest with a mid-size premium; POL-789 has the
        // largest premium but almost no urgency.
        let cfg = ScoringConfig::default();
        let scores: Vec<f64> = demo_policies()
            .iter()
            .map(|p| score_policy(p, &cfg).unwrap().total())
            .collect();
        assert!(scores[0] > scores[2]);
    }
}
