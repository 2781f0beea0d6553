//! Citation markers and provenance links.
//!
//! Generated narratives cite source records inline as `[SOURCE:id]`.
//! This module resolves those markers against the records that were
//! actually fetched, rewrites resolved ones as Markdown deep links and
//! flags the rest — a marker pointing at nothing is a signal, never
//! silently dropped.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use copilot_connector::{Policy, Snippet};

use crate::model::Citation;

static SOURCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[SOURCE:([^\]\s]+)\]").unwrap());

/// Map of record id to deep link for everything fetched this request.
/// Records without a link are absent; markers citing them resolve as
/// link-less citations.
pub fn provenance_map(
    policy: &Policy,
    sources: &BTreeMap<String, Vec<Snippet>>,
) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(link) = &policy.link {
        map.insert(policy.id.clone(), link.clone());
    }
    for snippets in sources.values() {
        for s in snippets {
            if let Some(link) = &s.link {
                map.insert(s.id.clone(), link.clone());
            }
        }
    }
    map
}

/// Rewrite `[SOURCE:id]` markers as `[📎](link)` and collect citations.
///
/// Markers whose id has no link in `provenance` are left verbatim in the
/// text and returned with `resolved: false`. Citations are deduplicated
/// by id, first occurrence order.
pub fn inject_links(
    text: &str,
    provenance: &BTreeMap<String, String>,
) -> (String, Vec<Citation>) {
    let mut out = String::with_capacity(text.len());
    let mut citations: Vec<Citation> = Vec::new();
    let mut last_end = 0;

    for caps in SOURCE_MARKER.captures_iter(text) {
        let m = caps.get(0).unwrap();
        let source_id = &caps[1];
        out.push_str(&text[last_end..m.start()]);

        match provenance.get(source_id) {
            Some(link) => {
                out.push_str(&format!("[📎]({link})"));
                push_citation(&mut citations, source_id, Some(link.clone()), true);
            }
            None => {
                out.push_str(m.as_str());
                push_citation(&mut citations, source_id, None, false);
            }
        }
        last_end = m.end();
    }
    out.push_str(&text[last_end..]);

    (out, citations)
}

fn push_citation(citations: &mut Vec<Citation>, source_id: &str, link: Option<String>, resolved: bool) {
    if citations.iter().any(|c| c.source_id == source_id) {
        return;
    }
    citations.push(Citation { source_id: source_id.to_string(), link, resolved });
}

/// Markdown provenance footer listing every citation.
pub fn sources_footer(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n---\n📎 **Data Provenance:**\n");
    for c in citations {
        match &c.link {
            Some(link) => out.push_str(&format!("- [{}]({link})\n", c.source_id)),
            None => out.push_str(&format!("- {} (no link available)\n", c.source_id)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_connector::fixture::{demo_meeting_snippets, demo_policies};

    fn prov() -> BTreeMap<String, String> {
        let mut sources = BTreeMap::new();
        sources.insert("graph_calendar".to_string(), demo_meeting_snippets());
        provenance_map(&demo_policies()[0], &sources)
    }

    #[test]
    fn provenance_includes_policy_and_snippets() {
        let map = prov();
        assert_eq!(map["POL-123"], "https://crm.example.com/policy/POL-123");
        assert_eq!(map["mtg-1"], "https://outlook.office.com/calendar/item/mtg-1");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn resolved_markers_become_links() {
        let (text, citations) = inject_links(
            "Client met on Nov 20 [SOURCE:mtg-1] and again [SOURCE:mtg-2].",
            &prov(),
        );
        assert_eq!(
            text,
            "Client met on Nov 20 [📎](https://outlook.office.com/calendar/item/mtg-1) \
             and again [📎](https://outlook.office.com/calendar/item/mtg-2)."
        );
        assert_eq!(citations.len(), 2);
        assert!(citations.iter().all(|c| c.resolved));
    }

    #[test]
    fn unresolved_markers_are_kept_and_flagged() {
        let (text, citations) = inject_links("Claim settled [SOURCE:claim-99].", &prov());
        assert_eq!(text, "Claim settled [SOURCE:claim-99].");
        assert_eq!(citations.len(), 1);
        assert!(!citations[0].resolved);
        assert!(citations[0].link.is_none());
    }

    #[test]
    fn citations_deduplicate_by_id() {
        let (_, citations) =
            inject_links("[SOURCE:mtg-1] then [SOURCE:mtg-1] again", &prov());
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        let input = "No citations here, just [markdown](https://example.com).";
        let (text, citations) = inject_links(input, &prov());
        assert_eq!(text, input);
        assert!(citations.is_empty());
    }

    #[test]
    fn footer_lists_all_citations() {
        let citations = vec![
            Citation { source_id: "mtg-1".into(), link: Some("https://x/mtg-1".into()), resolved: true },
            Citation { source_id: "claim-99".into(), link: None, resolved: false },
        ];
        let footer = sources_footer(&citations);
        assert!(footer.contains("- [mtg-1](https://x/mtg-1)"));
        assert!(footer.contains("- claim-99 (no link available)"));
        assert!(sources_footer(&[]).is_empty());
    }
}
