//! Heuristic E-E-A-T: author, credentials, citations and their trust.

use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::config::AuthorityConfig;
use crate::domain::{clamp_score, Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::contains_term;

pub const RULE_ID: &str = "authority.eeat_signals";

pub struct EeatSignalsRule;

#[async_trait]
impl Rule for EeatSignalsRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "E-E-A-T signals", Dimension::Authority, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        Ok(assess(ctx))
    }
}

/// Shared with the LLM rule, which falls back to it.
pub(crate) fn assess(ctx: &RuleContext) -> RuleOutcome {
    let config = &ctx.config.authority;
    let signals = &ctx.signals.authority;
    let mut score = u32::from(config.base_score);
    let mut outcome = RuleOutcome::default();

    let named_authors: Vec<&String> = signals
        .author_names
        .iter()
        .filter(|name| !is_generic_author(name, config))
        .collect();

    if let Some(author) = named_authors.first() {
        score += u32::from(config.author_points);
        outcome = outcome.evidence(format!("Named author: {author}"));
    } else {
        if !signals.author_names.is_empty() {
            outcome = outcome.evidence(format!(
                "Only generic bylines found: {}",
                signals.author_names.join(", ")
            ));
        }
        outcome = outcome.issue(Issue::new(
            Severity::High,
            "No named author found",
            "Add a visible byline naming the person who wrote the content",
        ));
    }

    let credential = find_credential(&named_authors, &ctx.clean_content, config);
    match &credential {
        Some(keyword) => {
            score += u32::from(config.credential_points);
            outcome = outcome.evidence(format!("Author credential: {keyword}"));
        }
        None if !named_authors.is_empty() => {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Author credentials are not shown",
                "State the author's qualifications or experience next to the byline",
            ));
        }
        None => {}
    }

    let citations = &signals.citation_candidates;
    let trusted = citations
        .iter()
        .filter(|c| is_trusted_host(citation_host(c), &config.trusted_domains))
        .count();
    let trusted_fraction = if citations.is_empty() {
        0.0
    } else {
        trusted as f64 / citations.len() as f64
    };

    let citations_awarded = citations.len() >= config.min_citations;
    if citations_awarded {
        score += u32::from(config.citation_points);
        outcome = outcome.evidence(format!("{} outbound citations", citations.len()));
        if trusted_fraction >= config.trusted_fraction {
            score += u32::from(config.trusted_citation_points);
            outcome = outcome.evidence(format!("{trusted} of {} citations to trusted sources", citations.len()));
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Low,
                "Few citations point to authoritative sources",
                "Cite primary research, standards bodies or government sources",
            ));
        }
    } else {
        outcome = outcome.issue(Issue::new(
            Severity::Medium,
            format!(
                "Only {} outbound citation(s); at least {} expected",
                citations.len(),
                config.min_citations
            ),
            "Link to the sources that back up the page's claims",
        ));
    }

    outcome.score = f64::from(clamp_score(f64::from(score)));
    outcome.details(json!({
        "authors": signals.author_names,
        "named_author": named_authors.first(),
        "credential": credential,
        "citation_count": citations.len(),
        "trusted_citation_count": trusted,
        "trusted_fraction": trusted_fraction,
    }))
}

fn is_generic_author(name: &str, config: &AuthorityConfig) -> bool {
    let name = name.trim().to_lowercase();
    name.is_empty() || config.generic_author_names.iter().any(|g| g.to_lowercase() == name)
}

/// First credential keyword in an author's text or within the window around the name.
fn find_credential(authors: &[&String], content: &str, config: &AuthorityConfig) -> Option<String> {
    let content_lower = content.to_lowercase();
    for author in authors {
        let author_lower = author.to_lowercase();
        if let Some(keyword) = first_keyword(&author_lower, &config.credential_keywords) {
            return Some(keyword.clone());
        }
        // Compare on the bare name so "Jane Doe, PhD" still finds "Jane Doe" in the body.
        let name = author_lower.split(',').next().unwrap_or(&author_lower).trim();
        if name.is_empty() {
            continue;
        }
        for (idx, _) in content_lower.match_indices(name) {
            let window = char_window(&content_lower, idx, idx + name.len(), config.credential_window_chars);
            if let Some(keyword) = first_keyword(window, &config.credential_keywords) {
                return Some(keyword.clone());
            }
        }
    }
    None
}

fn first_keyword<'a>(text_lower: &str, keywords: &'a [String]) -> Option<&'a String> {
    keywords.iter().find(|k| contains_term(text_lower, k))
}

/// `text[start..end]` widened by up to `radius` characters on each side.
fn char_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

fn citation_host(candidate: &str) -> &str {
    candidate.split('/').next().unwrap_or(candidate)
}

/// Dotted entries match by substring; bare entries (`gov`) match the last label.
pub(crate) fn is_trusted_host(host: &str, trusted: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    let last_label = host.rsplit('.').next().unwrap_or(&host);
    trusted.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        if entry.is_empty() {
            false
        } else if entry.contains('.') {
            host.contains(&entry)
        } else {
            last_label == entry
        }
    })
}
