//! Domain authority from web research, cached per domain.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::truncate_chars;
use crate::service::cache::{DomainResearch, DomainResearchCache};
use crate::service::llm::CallOptions;

pub const RULE_ID: &str = "authority.domain_authority";

const RAW_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityClassification {
    High,
    Medium,
    Low,
    Unknown,
}

impl AuthorityClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityClassification::High => "HIGH",
            AuthorityClassification::Medium => "MEDIUM",
            AuthorityClassification::Low => "LOW",
            AuthorityClassification::Unknown => "UNKNOWN",
        }
    }

    /// `classification: HIGH` style line first, then loose keyword phrases.
    pub fn parse(text: &str) -> Self {
        static LINE: OnceLock<Regex> = OnceLock::new();
        let line = LINE.get_or_init(|| {
            Regex::new(r"(?i)classification\s*[:=]\s*\**\s*(HIGH|MEDIUM|LOW|UNKNOWN)\b").expect("static regex")
        });
        if let Some(level) = line.captures(text).and_then(|c| c.get(1)) {
            return match level.as_str().to_ascii_uppercase().as_str() {
                "HIGH" => Self::High,
                "MEDIUM" => Self::Medium,
                "LOW" => Self::Low,
                _ => Self::Unknown,
            };
        }

        let lower = text.to_lowercase();
        if lower.contains("high authority") || lower.contains("highly authoritative") {
            Self::High
        } else if lower.contains("medium authority") || lower.contains("moderate authority") {
            Self::Medium
        } else if lower.contains("low authority") || lower.contains("little authority") {
            Self::Low
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for AuthorityClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct DomainAuthorityRule {
    cache: Arc<DomainResearchCache>,
}

impl DomainAuthorityRule {
    pub fn new(cache: Arc<DomainResearchCache>) -> Self {
        Self { cache }
    }

    fn prompt(domain: &str) -> String {
        format!(
            "Research the website {domain}. Assess its authority as a source: who operates it, \
             how often reputable publications cite or link to it, its age and its topical expertise.\n\
             Summarise the evidence in a few sentences, then finish with a single line of the form\n\
             classification: HIGH|MEDIUM|LOW|UNKNOWN"
        )
    }

    async fn research(ctx: &RuleContext) -> DomainResearch {
        let options = CallOptions::research(&ctx.config.llm);
        match ctx
            .llm
            .call(ctx.config.llm.research_provider, &Self::prompt(&ctx.domain), &options)
            .await
        {
            Ok(response) => DomainResearch {
                classification: AuthorityClassification::parse(&response.text),
                raw_text: response.text,
                researched_at: Utc::now(),
                failed: false,
            },
            Err(e) => {
                tracing::warn!("Domain research failed for {}: {}", ctx.domain, e);
                DomainResearch {
                    classification: AuthorityClassification::Unknown,
                    raw_text: e.to_string(),
                    researched_at: Utc::now(),
                    failed: true,
                }
            }
        }
    }
}

#[async_trait]
impl Rule for DomainAuthorityRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Domain authority", Dimension::Authority, Applicability::domain()).with_llm()
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.domain_authority;
        let research = self
            .cache
            .get_or_research(&ctx.domain, || Self::research(ctx))
            .await;

        let score = match research.classification {
            AuthorityClassification::High => config.high_score,
            AuthorityClassification::Medium => config.medium_score,
            AuthorityClassification::Low => config.low_score,
            AuthorityClassification::Unknown => config.unknown_score,
        };

        let mut outcome = RuleOutcome::new(score)
            .evidence(format!("Domain authority classified {}", research.classification));
        if research.failed {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Domain authority research unavailable",
                "Re-run the domain analysis once the research service is reachable",
            ));
        } else {
            outcome = outcome.maybe_issue(ctx.issue_for(
                score,
                format!("Domain authority is {}", research.classification.as_str().to_lowercase()),
                "Earn citations from reputable publications and publish expert-authored content",
            ));
        }

        Ok(outcome.details(json!({
            "classification": research.classification,
            "research_failed": research.failed,
            "researched_at": research.researched_at,
            "research_excerpt": truncate_chars(&research.raw_text, RAW_EXCERPT_CHARS),
        })))
    }
}
