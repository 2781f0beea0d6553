//! Natural-language score explanations, with a deterministic templated
//! fallback when the generator is unavailable or slow.

use std::time::Duration;

use tracing::{debug, warn};

use copilot_connector::Policy;
use copilot_genai::{GenerationError, GenerationRequest, TextGenerator};

use crate::model::{PriorityBand, ScoreBreakdown};

const SYSTEM_INSTRUCTION: &str = "You are an assistant for commercial insurance brokers. \
    Explain renewal priority scores in one or two short sentences. \
    Be concrete: name the premium, the days to expiry and the claims count \
    that drive the score. No preamble, no markdown.";

/// Explain one score. Never fails: on generator error, timeout or empty
/// output the templated fallback is returned instead.
pub async fn explain(
    generator: &dyn TextGenerator,
    policy: &Policy,
    breakdown: &ScoreBreakdown,
    timeout: Duration,
) -> String {
    let req = GenerationRequest::new(build_prompt(policy, breakdown))
        .with_system(SYSTEM_INSTRUCTION);

    match tokio::time::timeout(timeout, generator.generate(req)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(Ok(_)) => {
            warn!(policy = %policy.id, "empty explanation from generator, using fallback");
            fallback_explanation(policy, breakdown)
        }
        Ok(Err(GenerationError::NotConfigured(_))) => {
            debug!(policy = %policy.id, "generation disabled, using templated explanation");
            fallback_explanation(policy, breakdown)
        }
        Ok(Err(e)) => {
            warn!(policy = %policy.id, error = %e, "explanation generation failed, using fallback");
            fallback_explanation(policy, breakdown)
        }
        Err(_) => {
            warn!(policy = %policy.id, "explanation generation timed out, using fallback");
            fallback_explanation(policy, breakdown)
        }
    }
}

fn build_prompt(policy: &Policy, breakdown: &ScoreBreakdown) -> String {
    format!(
        "Policy {number} for {client}: premium at risk {premium}, \
         {days} days to expiry, {claims} claims this term. \
         Priority score {score:.2} \
         (premium component {p:.2}, urgency {u:.2}, claims {c:.2}). \
         Explain why this renewal has this priority.",
        number = policy.policy_number,
        client = policy.client_name,
        premium = format_usd(policy.premium_at_risk),
        days = policy.days_to_expiry,
        claims = policy.claims_frequency,
        score = breakdown.total(),
        p = breakdown.premium_score,
        u = breakdown.urgency_score,
        c = breakdown.claims_score,
    )
}

/// Deterministic explanation used when no generator is available.
pub fn fallback_explanation(policy: &Policy, breakdown: &ScoreBreakdown) -> String {
    let score = breakdown.total();
    let days = policy.days_to_expiry;
    if score >= 0.7 {
        format!(
            "High priority due to {} premium with {days} days to expiry.",
            format_usd(policy.premium_at_risk)
        )
    } else if score >= 0.5 {
        format!("Medium priority - {days} days until expiry, monitor closely.")
    } else {
        format!("Lower priority - sufficient time remaining ({days} days).")
    }
}

/// Interpretation line for the score endpoint: band label plus rationale.
pub fn interpretation(band: PriorityBand, rationale: &str) -> String {
    format!("{}. {}", band.label(), rationale)
}

/// `$1,234,567` formatting for whole-dollar amounts.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round().abs() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if amount < 0.0 {
        out.push('-');
    }
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
