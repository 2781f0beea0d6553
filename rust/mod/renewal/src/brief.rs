//! Renewal brief aggregation pipeline.
//!
//! One request fans out to every configured source under a shared
//! deadline, scores the policy, synthesizes a cited narrative and
//! attaches provenance. Source failures are partial: the brief ships
//! with whatever responded, plus explicit failure entries. Only a dead
//! CRM (no policy, nothing to score) aborts the request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use copilot_connector::{Connector, CrmConnector, Policy, Snippet};
use copilot_core::{ServiceConfig, ServiceError};
use copilot_genai::{GenerationError, GenerationRequest, TextGenerator};

use crate::citations::{inject_links, provenance_map, sources_footer};
use crate::explain::format_usd;
use crate::model::{Brief, BriefPhase, Citation, ScoreBreakdown, SourceFailure};
use crate::scoring::{ScoringConfig, score_policy};

/// Undelivered chunks a streaming brief may hold before the producer
/// blocks. A closed receiver then surfaces within one send.
const STREAM_BUFFER: usize = 16;

/// Words per chunk when streaming the templated fallback.
const FALLBACK_CHUNK_WORDS: usize = 10;

const SYSTEM_INSTRUCTION: &str = "You are an assistant for commercial insurance brokers \
    preparing renewal briefs. Write concise Markdown with these sections: \
    Policy Overview, Risk Analysis, Recent Communications Summary, Suggested Next Actions. \
    Every factual claim must cite its source record inline as [SOURCE:id], using only \
    ids present in the provided data. Do not invent facts or source ids.";

pub struct BriefPipeline {
    crm: Arc<dyn CrmConnector>,
    connectors: Vec<Arc<dyn Connector>>,
    generator: Arc<dyn TextGenerator>,
    scoring: ScoringConfig,
    fetch_deadline: Duration,
    generation_timeout: Duration,
    snippet_limit: usize,
}

/// Everything the fan-out produced for one request.
struct Fetched {
    policy: Policy,
    sources: BTreeMap<String, Vec<Snippet>>,
    failures: Vec<SourceFailure>,
}

impl BriefPipeline {
    pub fn new(
        crm: Arc<dyn CrmConnector>,
        connectors: Vec<Arc<dyn Connector>>,
        generator: Arc<dyn TextGenerator>,
        scoring: ScoringConfig,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            crm,
            connectors,
            generator,
            scoring,
            fetch_deadline: config.fetch_deadline(),
            generation_timeout: config.generation_timeout(),
            snippet_limit: config.snippet_limit,
        }
    }

    /// Fetch the policy, then fan out to every snippet source. The CRM
    /// fetch and the fan-out share one deadline: whatever the CRM uses
    /// comes out of the snippet sources' budget.
    async fn fetch(&self, policy_id: &str) -> Result<Fetched, ServiceError> {
        debug!(policy = policy_id, phase = ?BriefPhase::Fetching, "brief fetch");
        let started = tokio::time::Instant::now();

        let policy = match tokio::time::timeout(
            self.fetch_deadline,
            self.crm.fetch_policy(policy_id),
        )
        .await
        {
            Ok(Ok(policy)) => policy,
            Ok(Err(e)) if e.is_not_found() => {
                return Err(ServiceError::NotFound(format!("policy '{policy_id}' not found")));
            }
            Ok(Err(e)) => {
                return Err(ServiceError::NoData(format!(
                    "no responsive sources for policy '{policy_id}': {} failed: {e}",
                    self.crm.name()
                )));
            }
            Err(_) => {
                return Err(ServiceError::NoData(format!(
                    "no responsive sources for policy '{policy_id}': {} timed out after {}ms",
                    self.crm.name(),
                    self.fetch_deadline.as_millis()
                )));
            }
        };

        let query = policy.client_name.clone();
        let remaining = self.fetch_deadline.saturating_sub(started.elapsed());
        let limit = self.snippet_limit;
        let results = join_all(self.connectors.iter().map(|c| {
            let query = query.clone();
            async move {
                let name = c.name();
                (name, tokio::time::timeout(remaining, c.fetch_snippets(&query, limit)).await)
            }
        }))
        .await;

        let mut sources = BTreeMap::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(Ok(snippets)) => {
                    debug!(source = name, count = snippets.len(), "source responded");
                    sources.insert(name.to_string(), snippets);
                }
                Ok(Err(e)) => {
                    warn!(source = name, error = %e, "source failed, continuing without it");
                    failures.push(SourceFailure { source: name.to_string(), error: e.to_string() });
                }
                Err(_) => {
                    warn!(source = name, "source missed the fetch deadline");
                    failures.push(SourceFailure {
                        source: name.to_string(),
                        error: format!(
                            "timed out after {}ms shared fetch deadline",
                            self.fetch_deadline.as_millis()
                        ),
                    });
                }
            }
        }

        info!(
            policy = policy_id,
            responded = sources.len(),
            failed = failures.len(),
            "brief fan-out complete"
        );
        Ok(Fetched { policy, sources, failures })
    }

    /// Generate the full brief document in one call.
    pub async fn generate(&self, policy_id: &str) -> Result<Brief, ServiceError> {
        let fetched = self.fetch(policy_id).await?;
        let breakdown = score_policy(&fetched.policy, &self.scoring)?;
        debug!(policy = policy_id, phase = ?BriefPhase::Synthesizing, "brief synthesis");

        let req = GenerationRequest::new(build_prompt(&fetched, &breakdown))
            .with_system(SYSTEM_INSTRUCTION);
        let narrative =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(req)).await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => text,
                Ok(Ok(_)) => {
                    warn!(policy = policy_id, "empty narrative from generator, using fallback");
                    fallback_brief(&fetched, &breakdown)
                }
                Ok(Err(GenerationError::NotConfigured(_))) => {
                    debug!(policy = policy_id, "generation disabled, using templated brief");
                    fallback_brief(&fetched, &breakdown)
                }
                Ok(Err(e)) => {
                    warn!(policy = policy_id, error = %e, "narrative generation failed, using fallback");
                    fallback_brief(&fetched, &breakdown)
                }
                Err(_) => {
                    warn!(policy = policy_id, "narrative generation timed out, using fallback");
                    fallback_brief(&fetched, &breakdown)
                }
            };

        let provenance = provenance_map(&fetched.policy, &fetched.sources);
        let (narrative_with_links, citations) = inject_links(&narrative, &provenance);
        let confidence = confidence(&fetched, &citations);

        Ok(Brief {
            policy: fetched.policy,
            sources: fetched.sources,
            failures: fetched.failures,
            score: breakdown.total(),
            score_breakdown: breakdown,
            narrative,
            narrative_with_links,
            citations,
            confidence,
            phase: BriefPhase::Complete,
        })
    }

    /// Generate the brief as a chunk stream.
    ///
    /// Fetch and scoring happen before this returns, so terminal errors
    /// still get real HTTP statuses. Dropping the receiver stops the
    /// producer within one send.
    pub async fn stream(&self, policy_id: &str) -> Result<mpsc::Receiver<String>, ServiceError> {
        let fetched = self.fetch(policy_id).await?;
        let breakdown = score_policy(&fetched.policy, &self.scoring)?;
        let provenance = provenance_map(&fetched.policy, &fetched.sources);

        let generator = Arc::clone(&self.generator);
        let generation_timeout = self.generation_timeout;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            run_stream(tx, generator, generation_timeout, fetched, breakdown, provenance).await;
        });
        Ok(rx)
    }
}

async fn send(tx: &mpsc::Sender<String>, text: String) -> bool {
    if tx.send(text).await.is_err() {
        debug!("brief stream consumer gone, stopping");
        return false;
    }
    true
}

async fn run_stream(
    tx: mpsc::Sender<String>,
    generator: Arc<dyn TextGenerator>,
    generation_timeout: Duration,
    fetched: Fetched,
    breakdown: ScoreBreakdown,
    provenance: BTreeMap<String, String>,
) {
    let policy_id = fetched.policy.id.clone();
    debug!(policy = %policy_id, phase = ?BriefPhase::Streaming, "brief stream start");

    let mut header = format!(
        "✅ Policy loaded: {} ({})\n",
        fetched.policy.policy_number, fetched.policy.client_name
    );
    header.push_str(&format!(
        "📊 {} of {} sources responded\n",
        fetched.sources.len(),
        fetched.sources.len() + fetched.failures.len()
    ));
    for f in &fetched.failures {
        header.push_str(&format!("⚠️ {}: {}\n", f.source, f.error));
    }
    header.push_str(&format!("📈 Priority score: **{:.2}**\n\n", breakdown.total()));
    header.push_str("🤖 Generating brief...\n\n---\n\n");
    if !send(&tx, header).await {
        return;
    }

    let req = GenerationRequest::new(build_prompt(&fetched, &breakdown))
        .with_system(SYSTEM_INSTRUCTION);
    match tokio::time::timeout(generation_timeout, generator.generate_stream(req)).await {
        Ok(Ok(mut chunks)) => {
            let mut collected = String::new();
            let mut interrupted = false;
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        collected.push_str(&chunk);
                        if !send(&tx, chunk).await {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(policy = %policy_id, error = %e, "generation interrupted mid-stream");
                        interrupted = true;
                        break;
                    }
                }
            }
            if interrupted || collected.trim().is_empty() {
                let notice = "\n\n⚠️ Generation interrupted, continuing with templated brief.\n\n";
                if !send(&tx, notice.to_string()).await {
                    return;
                }
                stream_fallback(&tx, &fetched, &breakdown, &provenance).await;
                return;
            }
            let (_, citations) = inject_links(&collected, &provenance);
            let footer = sources_footer(&citations);
            if !footer.is_empty() && !send(&tx, footer).await {
                return;
            }
            debug!(policy = %policy_id, phase = ?BriefPhase::Complete, "brief stream complete");
        }
        Ok(Err(GenerationError::NotConfigured(_))) => {
            debug!(policy = %policy_id, "generation disabled, streaming templated brief");
            stream_fallback(&tx, &fetched, &breakdown, &provenance).await;
        }
        Ok(Err(e)) => {
            warn!(policy = %policy_id, error = %e, "generation failed, streaming templated brief");
            stream_fallback(&tx, &fetched, &breakdown, &provenance).await;
        }
        Err(_) => {
            warn!(policy = %policy_id, "generation timed out, streaming templated brief");
            stream_fallback(&tx, &fetched, &breakdown, &provenance).await;
        }
    }
}

/// Stream the templated brief in small word chunks, then the footer.
async fn stream_fallback(
    tx: &mpsc::Sender<String>,
    fetched: &Fetched,
    breakdown: &ScoreBreakdown,
    provenance: &BTreeMap<String, String>,
) {
    let narrative = fallback_brief(fetched, breakdown);
    let (linked, citations) = inject_links(&narrative, provenance);

    let words: Vec<&str> = linked.split_inclusive(' ').collect();
    for chunk in words.chunks(FALLBACK_CHUNK_WORDS) {
        if !send(tx, chunk.concat()).await {
            return;
        }
    }
    let footer = sources_footer(&citations);
    if !footer.is_empty() {
        let _ = send(tx, footer).await;
    }
}

/// The data context handed to the generator: policy facts plus every
/// fetched snippet, each tagged with its citation id.
fn build_prompt(fetched: &Fetched, breakdown: &ScoreBreakdown) -> String {
    let p = &fetched.policy;
    let mut prompt = format!(
        "POLICY [SOURCE:{id}]\n\
         Number: {number}\n\
         Client: {client}\n\
         Premium at risk: {premium}\n\
         Expiry: {expiry} ({days} days)\n\
         Claims this term: {claims}\n\
         Priority score: {score:.2} (premium {ps:.2}, urgency {us:.2}, claims {cs:.2})\n",
        id = p.id,
        number = p.policy_number,
        client = p.client_name,
        premium = format_usd(p.premium_at_risk),
        expiry = p.expiry_date,
        days = p.days_to_expiry,
        claims = p.claims_frequency,
        score = breakdown.total(),
        ps = breakdown.premium_score,
        us = breakdown.urgency_score,
        cs = breakdown.claims_score,
    );
    if let Some(t) = &p.policy_type {
        prompt.push_str(&format!("Type: {t}\n"));
    }

    for (source, snippets) in &fetched.sources {
        prompt.push_str(&format!("\n{} ({} records)\n", source.to_uppercase(), snippets.len()));
        for s in snippets {
            prompt.push_str(&format!(
                "- [SOURCE:{id}] {subject}{ts}: {text}\n",
                id = s.id,
                subject = s.subject,
                ts = s.timestamp.as_deref().map(|t| format!(" ({t})")).unwrap_or_default(),
                text = s.snippet,
            ));
        }
    }
    if !fetched.failures.is_empty() {
        prompt.push_str("\nUNAVAILABLE SOURCES\n");
        for f in &fetched.failures {
            prompt.push_str(&format!("- {}: {}\n", f.source, f.error));
        }
    }
    prompt
}

/// Deterministic brief used when generation is unavailable. Cites the
/// same source ids the generator would.
fn fallback_brief(fetched: &Fetched, breakdown: &ScoreBreakdown) -> String {
    let p = &fetched.policy;
    let score = breakdown.total();

    let mut out = format!("# Renewal Brief: {}\n\n", p.client_name);
    out.push_str("**Policy Overview**\n");
    out.push_str(&format!(
        "{number} renews on {expiry}, {days} days out, with {premium} premium at risk \
         [SOURCE:{id}].\n\n",
        number = p.policy_number,
        expiry = p.expiry_date,
        days = p.days_to_expiry,
        premium = format_usd(p.premium_at_risk),
        id = p.id,
    ));

    out.push_str("**Risk Analysis**\n");
    out.push_str(&format!(
        "Priority score {score:.2}: premium component {:.2}, urgency {:.2}, \
         claims {:.2} ({} claims this term).\n\n",
        breakdown.premium_score, breakdown.urgency_score, breakdown.claims_score, p.claims_frequency,
    ));

    out.push_str("**Recent Communications Summary**\n");
    if fetched.sources.values().all(|s| s.is_empty()) {
        out.push_str("No recent activity found across connected sources.\n\n");
    } else {
        for (source, snippets) in &fetched.sources {
            for s in snippets {
                out.push_str(&format!(
                    "- {source}: {} [SOURCE:{}]\n",
                    s.subject, s.id
                ));
            }
        }
        out.push('\n');
    }

    out.push_str("**Suggested Next Actions**\n");
    if score > 0.7 {
        out.push_str(&format!(
            "- Contact {} this week to open renewal discussions.\n",
            p.client_name
        ));
    } else {
        out.push_str("- Schedule a renewal review ahead of expiry.\n");
    }
    if p.claims_frequency > 0 {
        out.push_str("- Review the claims history before quoting.\n");
    }
    out
}

/// Brief confidence: weighted blend of source responsiveness, citation
/// resolution rate and data richness, clamped to [0,1]. The CRM counts
/// as a source and has necessarily responded by the time this runs.
fn confidence(fetched: &Fetched, citations: &[Citation]) -> f64 {
    let total_calls = fetched.sources.len() + fetched.failures.len() + 1;
    let ok_calls = fetched.sources.len() + 1;
    let call_rate = ok_calls as f64 / total_calls as f64;

    let citation_rate = if citations.is_empty() {
        0.0
    } else {
        citations.iter().filter(|c| c.resolved).count() as f64 / citations.len() as f64
    };

    let nonempty = fetched.sources.values().filter(|s| !s.is_empty()).count();
    let richness = (0.1 * nonempty as f64).min(0.2);

    (0.5 * call_rate + 0.4 * citation_rate + richness).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use copilot_connector::fixture::{
        FailingCrm, SlowConnector, StaticConnector, StaticCrm, demo_chat_snippets,
        demo_mail_snippets, demo_meeting_snippets,
    };
    use copilot_genai::fixture::{NullGenerator, StaticGenerator};
    use copilot_genai::{GenerationError, TextStream};

    fn config(fetch_deadline_ms: u64) -> ServiceConfig {
        ServiceConfig { fetch_deadline_ms, ..Default::default() }
    }

    fn pipeline(
        connectors: Vec<Arc<dyn Connector>>,
        generator: Arc<dyn TextGenerator>,
        fetch_deadline_ms: u64,
    ) -> BriefPipeline {
        BriefPipeline::new(
            Arc::new(StaticCrm::demo()),
            connectors,
            generator,
            ScoringConfig::default(),
            &config(fetch_deadline_ms),
        )
    }

    #[tokio::test]
    async fn slow_source_becomes_failure_entry() {
        let connectors: Vec<Arc<dyn Connector>> = vec![
            Arc::new(StaticConnector::new("graph_mail", demo_mail_snippets())),
            Arc::new(StaticConnector::new("graph_calendar", demo_meeting_snippets())),
            Arc::new(SlowConnector::new(
                "teams_chat",
                Duration::from_millis(500),
                demo_chat_snippets(),
            )),
        ];
        let p = pipeline(connectors, Arc::new(StaticGenerator::new("Met recently [SOURCE:mtg-1].")), 50);

        let brief = p.generate("POL-123").await.unwrap();
        assert_eq!(brief.sources.len(), 2);
        assert_eq!(brief.failures.len(), 1);
        assert_eq!(brief.failures[0].source, "teams_chat");
        assert!(brief.failures[0].error.contains("timed out"));
        assert_eq!(brief.phase, BriefPhase::Complete);
    }

    #[tokio::test]
    async fn dead_crm_is_no_data() {
        let p = BriefPipeline::new(
            Arc::new(FailingCrm),
            vec![Arc::new(StaticConnector::new("graph_mail", demo_mail_snippets()))],
            Arc::new(NullGenerator),
            ScoringConfig::default(),
            &config(50),
        );
        let err = p.generate("POL-123").await.unwrap_err();
        assert!(matches!(err, ServiceError::NoData(_)));
    }

    #[tokio::test]
    async fn unknown_policy_is_not_found() {
        let p = pipeline(vec![], Arc::new(NullGenerator), 50);
        let err = p.generate("POL-999").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn citations_resolve_against_fetched_records() {
        let connectors: Vec<Arc<dyn Connector>> =
            vec![Arc::new(StaticConnector::new("graph_calendar", demo_meeting_snippets()))];
        let generator =
            StaticGenerator::new("Met on Nov 20 [SOURCE:mtg-1]. Claim settled [SOURCE:claim-99].");
        let p = pipeline(connectors, Arc::new(generator), 50);

        let brief = p.generate("POL-123").await.unwrap();
        assert_eq!(brief.citations.len(), 2);
        let resolved = brief.citations.iter().find(|c| c.source_id == "mtg-1").unwrap();
        assert!(resolved.resolved);
        let dangling = brief.citations.iter().find(|c| c.source_id == "claim-99").unwrap();
        assert!(!dangling.resolved);
        assert!(brief.narrative_with_links.contains("[📎]("));
        assert!(brief.narrative_with_links.contains("[SOURCE:claim-99]"));
        assert!(brief.confidence > 0.0 && brief.confidence <= 1.0);
    }

    #[tokio::test]
    async fn fallback_brief_is_cited_and_complete() {
        let connectors: Vec<Arc<dyn Connector>> =
            vec![Arc::new(StaticConnector::new("graph_calendar", demo_meeting_snippets()))];
        let p = pipeline(connectors, Arc::new(NullGenerator), 50);

        let brief = p.generate("POL-123").await.unwrap();
        assert!(brief.narrative.contains("Policy Overview"));
        assert!(brief.narrative.contains("[SOURCE:POL-123]"));
        assert!(brief.narrative.contains("[SOURCE:mtg-1]"));
        assert!(brief.citations.iter().all(|c| c.resolved));
        assert_eq!(brief.phase, BriefPhase::Complete);
    }

    #[tokio::test]
    async fn stream_carries_status_narrative_and_footer() {
        let connectors: Vec<Arc<dyn Connector>> =
            vec![Arc::new(StaticConnector::new("graph_calendar", demo_meeting_snippets()))];
        let generator = StaticGenerator::new("Coverage review went well [SOURCE:mtg-1].");
        let p = pipeline(connectors, Arc::new(generator), 50);

        let mut rx = p.stream("POL-123").await.unwrap();
        let mut out = String::new();
        while let Some(chunk) = rx.recv().await {
            out.push_str(&chunk);
        }
        assert!(out.contains("Priority score"));
        assert!(out.contains("Coverage review went well"));
        assert!(out.contains("Data Provenance"));
        assert!(out.contains("outlook.office.com/calendar/item/mtg-1"));
    }

    #[tokio::test]
    async fn stream_falls_back_when_generation_disabled() {
        let p = pipeline(vec![], Arc::new(NullGenerator), 50);
        let mut rx = p.stream("POL-456").await.unwrap();
        let mut out = String::new();
        while let Some(chunk) = rx.recv().await {
            out.push_str(&chunk);
        }
        assert!(out.contains("Policy Overview"));
        assert!(out.contains("Suggested Next Actions"));
    }

    /// CRM that answers after a delay, for exercising the shared deadline.
    struct SlowCrm {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl CrmConnector for SlowCrm {
        fn name(&self) -> &'static str {
            "slow_crm"
        }

        async fn fetch_policy(
            &self,
            policy_id: &str,
        ) -> Result<Policy, copilot_connector::ConnectorError> {
            tokio::time::sleep(self.delay).await;
            StaticCrm::demo().fetch_policy(policy_id).await
        }

        async fn renewal_pipeline(
            &self,
            days_window: u32,
        ) -> Result<Vec<Policy>, copilot_connector::ConnectorError> {
            tokio::time::sleep(self.delay).await;
            StaticCrm::demo().renewal_pipeline(days_window).await
        }
    }

    #[tokio::test]
    async fn crm_time_counts_against_the_fanout_budget() {
        // Deadline 200ms; the CRM eats 150ms of it, so a 150ms connector
        // cannot finish inside the remainder.
        let p = BriefPipeline::new(
            Arc::new(SlowCrm { delay: Duration::from_millis(150) }),
            vec![Arc::new(SlowConnector::new(
                "graph_mail",
                Duration::from_millis(150),
                demo_mail_snippets(),
            ))],
            Arc::new(NullGenerator),
            ScoringConfig::default(),
            &config(200),
        );
        let brief = p.generate("POL-123").await.unwrap();
        assert!(brief.sources.is_empty());
        assert_eq!(brief.failures.len(), 1);
        assert_eq!(brief.failures[0].source, "graph_mail");
    }

    /// Counts how many chunks the pipeline pulls from the generator.
    struct InfiniteGenerator(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl TextGenerator for InfiniteGenerator {
        async fn generate(&self, _req: GenerationRequest) -> Result<String, GenerationError> {
            Ok("unused".into())
        }

        async fn generate_stream(
            &self,
            _req: GenerationRequest,
        ) -> Result<TextStream, GenerationError> {
            let counter = Arc::clone(&self.0);
            Ok(Box::pin(futures::stream::unfold(counter, |counter| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Some((Ok("chunk ".to_string()), counter))
            })))
        }
    }

    #[tokio::test]
    async fn dropping_receiver_stops_the_producer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let p = pipeline(vec![], Arc::new(InfiniteGenerator(Arc::clone(&counter))), 50);

        let mut rx = p.stream("POL-123").await.unwrap();
        rx.recv().await.unwrap();
        drop(rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_drop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }
}
