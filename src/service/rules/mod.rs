//! Scoring rules and the context they run against.
//!
//! A rule is an independent unit that looks at one page (or one domain) and
//! produces a 0-100 sub-score with evidence and issues. Rules never see each
//! other; the registry decides which ones apply and the runner isolates
//! failures so one broken rule cannot sink a dimension.

pub mod authority;
pub mod brand;
pub mod domain_authority;
pub mod freshness;
pub mod llm_eeat;
pub mod quality;
pub mod registry;
pub mod schema_coverage;
pub mod snippet;
pub mod structure;
pub mod technical;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ScoringConfig;
use crate::domain::{
    CategoryType, Dimension, Issue, PageCategory, PageMetadata, PageSignals, ProjectContext,
    RuleResult, Severity,
};
use crate::error::{RuleError, ScoringError};
use crate::extractor::page_extractor::normalize_host;
use crate::service::issues::issue_for_score;
use crate::service::llm::LlmClient;

pub use registry::{RegisteredRule, RuleRegistry};

pub const DEFAULT_PASS_THRESHOLD: u8 = 60;

/// Categories whose pages carry editorial content.
pub const CONTENT_CATEGORIES: &[CategoryType] = &[
    CategoryType::BlogArticle,
    CategoryType::Documentation,
    CategoryType::CaseStudy,
    CategoryType::Faq,
    CategoryType::ProductService,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Page,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicability {
    pub scope: Scope,
    /// Empty means every category.
    pub categories: Vec<CategoryType>,
}

impl Applicability {
    pub fn all_pages() -> Self {
        Self {
            scope: Scope::Page,
            categories: Vec::new(),
        }
    }

    pub fn pages(categories: &[CategoryType]) -> Self {
        Self {
            scope: Scope::Page,
            categories: categories.to_vec(),
        }
    }

    pub fn domain() -> Self {
        Self {
            scope: Scope::Domain,
            categories: Vec::new(),
        }
    }

    pub fn applies(&self, category: CategoryType, scope: Scope) -> bool {
        self.scope == scope && (self.categories.is_empty() || self.categories.contains(&category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    pub dimension: Dimension,
    pub weight: f64,
    pub applicability: Applicability,
    pub pass_threshold: u8,
    pub uses_llm: bool,
}

impl RuleMeta {
    pub fn new(id: &str, name: &str, dimension: Dimension, applicability: Applicability) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            dimension,
            weight: 1.0,
            applicability,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            uses_llm: false,
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_llm(mut self) -> Self {
        self.uses_llm = true;
        self
    }
}

/// What a rule hands back; the runner turns it into a `RuleResult`.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub score: f64,
    pub evidence: Vec<String>,
    pub details: serde_json::Value,
    pub issues: Vec<Issue>,
}

impl RuleOutcome {
    pub fn new(score: impl Into<f64>) -> Self {
        Self {
            score: score.into(),
            ..Default::default()
        }
    }

    pub fn evidence(mut self, line: impl Into<String>) -> Self {
        self.evidence.push(line.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn maybe_issue(mut self, issue: Option<Issue>) -> Self {
        self.issues.extend(issue);
        self
    }
}

#[async_trait]
pub trait Rule: Send + Sync {
    fn meta(&self) -> RuleMeta;

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError>;
}

/// Everything a rule may look at. Built once per page (or domain) run.
#[derive(Clone)]
pub struct RuleContext {
    pub url: Url,
    pub domain: String,
    pub html: Arc<str>,
    pub clean_content: Arc<str>,
    pub metadata: PageMetadata,
    pub signals: Arc<PageSignals>,
    pub category: PageCategory,
    pub project: ProjectContext,
    pub llm: Arc<dyn LlmClient>,
    pub config: Arc<ScoringConfig>,
    pub now: DateTime<Utc>,
    /// Signals of every processed page; only populated for domain runs.
    pub domain_pages: Arc<Vec<Arc<PageSignals>>>,
}

impl RuleContext {
    pub fn new(
        url: &str,
        signals: Arc<PageSignals>,
        category: PageCategory,
        llm: Arc<dyn LlmClient>,
        config: Arc<ScoringConfig>,
    ) -> Result<Self, ScoringError> {
        let (url, domain) = parse_page_url(url)?;
        Ok(Self {
            url,
            domain,
            html: Arc::from(""),
            clean_content: Arc::from(""),
            metadata: PageMetadata::default(),
            signals,
            category,
            project: ProjectContext::default(),
            llm,
            config,
            now: Utc::now(),
            domain_pages: Arc::new(Vec::new()),
        })
    }

    pub fn with_html(mut self, html: &str, clean_content: String) -> Self {
        self.html = Arc::from(html);
        self.clean_content = Arc::from(clean_content);
        self
    }

    pub fn with_metadata(mut self, metadata: PageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_project(mut self, project: ProjectContext) -> Self {
        self.project = project;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_domain_pages(mut self, pages: Vec<Arc<PageSignals>>) -> Self {
        self.domain_pages = Arc::new(pages);
        self
    }

    /// Issue builder using the configured severity cut points.
    pub fn issue_for(
        &self,
        score: u8,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Option<Issue> {
        issue_for_score(score, &self.config.severity, description, recommendation)
    }
}

/// Parse an absolute http(s) URL and derive its domain (lowercase, no `www.`).
pub fn parse_page_url(raw: &str) -> Result<(Url, String), ScoringError> {
    let url = Url::parse(raw.trim()).map_err(|e| ScoringError::invalid_url(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScoringError::invalid_url(format!("{raw}: unsupported scheme")));
    }
    let domain = url
        .host_str()
        .map(normalize_host)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ScoringError::invalid_url(format!("{raw}: missing host")))?;
    Ok((url, domain))
}

/// Run one rule with failure isolation. Errors and panics become a zero score.
pub async fn run_rule(rule: &RegisteredRule, ctx: &RuleContext) -> RuleResult {
    let meta = &rule.meta;
    let outcome = AssertUnwindSafe(rule.rule.evaluate(ctx)).catch_unwind().await;

    let failure = match outcome {
        Ok(Ok(outcome)) => {
            let mut result = RuleResult::new(
                meta.id.clone(),
                meta.dimension,
                outcome.score,
                meta.weight,
                meta.pass_threshold,
            );
            result.evidence = outcome.evidence;
            result.details = outcome.details;
            result.issues = outcome
                .issues
                .into_iter()
                .map(|issue| issue.with_rule(&meta.id))
                .collect();
            return result;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "rule panicked".to_string(),
    };

    tracing::warn!("Rule {} failed for {}: {}", meta.id, ctx.url, failure);
    let mut result = RuleResult::new(meta.id.clone(), meta.dimension, 0.0, meta.weight, meta.pass_threshold);
    result.evidence.push(format!("Rule execution failed: {failure}"));
    result.details = serde_json::json!({ "error": failure });
    result.issues.push(
        Issue::new(
            Severity::High,
            format!("Rule execution failed: {}", meta.name),
            "Re-run the analysis; if the failure persists check the rule configuration",
        )
        .with_rule(&meta.id),
    );
    result
}
