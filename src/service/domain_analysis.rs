//! Domain-level analysis: run the domain-scoped rules once per domain/project
//! over a representative context, cache the result in the record store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ScoringConfig;
use crate::domain::{
    clamp_score, CategorySource, CategoryType, Dimension, DomainAnalysisMetadata, DomainAnalysisResult,
    Issue, PageCategory, PageContent, PageSignals, ProjectContext, RuleResult, Severity,
};
use crate::error::{Result, ScoringError};
use crate::extractor::page_extractor::normalize_host;
use crate::extractor::SignalExtractor;
use crate::repository::DomainAnalysisRepository;
use crate::service::aggregator::ConditionalAggregator;
use crate::service::cache::DomainResearchCache;
use crate::service::clock::{Clock, SystemClock};
use crate::service::issues::{unique_recommendations, IssueCollector};
use crate::service::llm::{CountingLlm, LlmClient};
use crate::service::rules::{parse_page_url, run_rule, RuleContext, RuleRegistry};

const DOMAIN_CONTEXT_REASON: &str = "domain-level analysis";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainAnalysisInput {
    pub domain: String,
    pub project_id: String,
    #[serde(default)]
    pub project: ProjectContext,
    #[serde(default)]
    pub pages: Vec<PageContent>,
}

/// A page that survived preparation.
struct PreparedPage<'a> {
    url: Url,
    page: &'a PageContent,
    signals: Arc<PageSignals>,
    clean_content: String,
}

pub struct DomainAnalysisOrchestrator {
    config: Arc<ScoringConfig>,
    registry: Arc<RuleRegistry>,
    repository: DomainAnalysisRepository,
    research_cache: Option<Arc<DomainResearchCache>>,
    extractor: SignalExtractor,
    clock: Arc<dyn Clock>,
}

impl DomainAnalysisOrchestrator {
    pub fn new(config: Arc<ScoringConfig>, registry: Arc<RuleRegistry>, repository: DomainAnalysisRepository) -> Self {
        Self {
            extractor: SignalExtractor::new(config.limits.clone()),
            config,
            registry,
            repository,
            research_cache: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Research cache to invalidate on refresh.
    pub fn with_research_cache(mut self, cache: Arc<DomainResearchCache>) -> Self {
        self.research_cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cached result if one is still inside the validity window, else a fresh run.
    pub async fn analyze_domain(
        &self,
        input: DomainAnalysisInput,
        llm: Arc<dyn LlmClient>,
    ) -> Result<DomainAnalysisResult> {
        let domain = normalize_domain(&input.domain)?;
        if let Some(cached) = self.cached(&domain, &input.project_id).await {
            return Ok(cached);
        }
        self.compute(domain, input, llm).await
    }

    /// Drop the cached analysis (and the domain's research) and recompute.
    pub async fn refresh_domain_analysis(
        &self,
        input: DomainAnalysisInput,
        llm: Arc<dyn LlmClient>,
    ) -> Result<DomainAnalysisResult> {
        let domain = normalize_domain(&input.domain)?;
        if let Err(e) = self.repository.invalidate(&domain, &input.project_id).await {
            tracing::warn!("Failed to invalidate cached analysis for {}: {}", domain, e);
        }
        if let Some(cache) = &self.research_cache {
            cache.invalidate(&domain);
        }
        self.compute(domain, input, llm).await
    }

    async fn cached(&self, domain: &str, project_id: &str) -> Option<DomainAnalysisResult> {
        let validity = Duration::hours(self.config.domain_analysis.cache_validity_hours);
        match self.repository.find_latest(domain, project_id).await {
            Ok(Some(mut cached)) => {
                let age = self.clock.now() - cached.metadata.completed_at;
                if age < validity {
                    tracing::info!("Using cached domain analysis {} for {}", cached.id, domain);
                    cached.metadata.from_cache = true;
                    return Some(cached);
                }
                tracing::debug!("Cached analysis for {} is {}h old, recomputing", domain, age.num_hours());
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Domain analysis cache lookup failed for {}: {}", domain, e);
                None
            }
        }
    }

    async fn compute(
        &self,
        domain: String,
        input: DomainAnalysisInput,
        llm: Arc<dyn LlmClient>,
    ) -> Result<DomainAnalysisResult> {
        let started_at = self.clock.now();
        let counting = Arc::new(CountingLlm::new(llm));
        let run_llm: Arc<dyn LlmClient> = counting.clone();

        let prepared = join_all(input.pages.iter().map(|page| self.prepare_page(&domain, page))).await;
        let (ok, failed): (Vec<_>, Vec<_>) = prepared.into_iter().partition(|p| p.is_some());
        let pages: Vec<PreparedPage> = ok.into_iter().flatten().collect();
        let pages_failed = failed.len();

        let mut collector = IssueCollector::new();
        let ctx = self.representative_context(&domain, &pages, &input.project, run_llm)?;
        if pages.is_empty() {
            collector.push(Issue::new(
                Severity::High,
                format!("No pages could be processed for {domain}"),
                "Provide crawled pages with HTML content and a success status",
            ));
        }

        let rules = self.registry.domain_rules();
        let mut rule_results = Vec::new();
        let mut dimension_scores = BTreeMap::new();
        let mut calculation_details = Vec::new();

        let overall_score = if rules.is_empty() {
            collector.push(Issue::new(
                Severity::Medium,
                "No domain rules configured",
                "Enable at least one domain-scoped rule to score the domain",
            ));
            self.config.domain_analysis.neutral_score
        } else {
            rule_results = join_all(rules.iter().map(|rule| run_rule(rule, &ctx))).await;

            let mut by_dimension: BTreeMap<Dimension, Vec<RuleResult>> = BTreeMap::new();
            for result in &rule_results {
                by_dimension.entry(result.dimension).or_default().push(result.clone());
            }
            for (dimension, results) in by_dimension {
                let aggregation = ConditionalAggregator::aggregate(dimension, &results);
                dimension_scores.insert(dimension, aggregation.final_score);
                collector.extend(aggregation.issues);
                calculation_details.push(aggregation.calculation_details);
            }
            overall_score(&dimension_scores, &self.config)
        };

        let issues = collector.into_sorted();
        let result = DomainAnalysisResult {
            id: uuid::Uuid::new_v4().to_string(),
            domain: domain.clone(),
            project_id: input.project_id.clone(),
            overall_score,
            dimension_scores,
            rule_results,
            recommendations: unique_recommendations(&issues),
            issues,
            calculation_details,
            metadata: DomainAnalysisMetadata {
                page_count: input.pages.len(),
                pages_analyzed: pages.len(),
                pages_failed,
                started_at,
                completed_at: self.clock.now(),
                llm_calls: counting.calls(),
                from_cache: false,
            },
        };
        tracing::info!(
            "Domain {} scored {} from {} of {} pages ({} LLM calls)",
            domain,
            result.overall_score,
            result.metadata.pages_analyzed,
            result.metadata.page_count,
            result.metadata.llm_calls
        );

        if let Err(e) = self.repository.save(&result).await {
            tracing::error!("Failed to persist domain analysis for {}: {}", domain, e);
        }
        Ok(result)
    }

    /// Extract one page, or `None` (logged) when it cannot contribute.
    async fn prepare_page<'a>(&self, domain: &str, page: &'a PageContent) -> Option<PreparedPage<'a>> {
        let url = match parse_page_url(&page.url) {
            Ok((url, host)) if host == domain || host.ends_with(&format!(".{domain}")) => url,
            Ok((_, host)) => {
                tracing::warn!("Skipping {}: host {} is outside {}", page.url, host, domain);
                return None;
            }
            Err(e) => {
                tracing::warn!("Skipping page: {}", e);
                return None;
            }
        };
        if let Some(status) = page.metadata.status_code.filter(|s| *s >= 400) {
            tracing::warn!("Skipping {}: HTTP status {}", url, status);
            return None;
        }
        if page.html.trim().is_empty() {
            tracing::warn!("Skipping {}: empty HTML", url);
            return None;
        }

        let signals = Arc::new(self.extractor.extract(&page.html, &page.metadata, url.as_str()));
        let clean_content = self.extractor.clean_content(&page.html);
        Some(PreparedPage {
            url,
            page,
            signals,
            clean_content,
        })
    }

    /// First prepared page as the representative, or a synthetic root page.
    fn representative_context(
        &self,
        domain: &str,
        pages: &[PreparedPage],
        project: &ProjectContext,
        llm: Arc<dyn LlmClient>,
    ) -> Result<RuleContext> {
        let category = PageCategory::new(CategoryType::Unknown, 1.0, CategorySource::Fallback, DOMAIN_CONTEXT_REASON);
        let mut ctx = match pages.first() {
            Some(first) => RuleContext::new(first.url.as_str(), first.signals.clone(), category, llm, self.config.clone())?
                .with_html(&first.page.html, first.clean_content.clone())
                .with_metadata(first.page.metadata.clone()),
            None => {
                tracing::warn!("No usable pages for {}, using a synthetic root context", domain);
                RuleContext::new(
                    &format!("https://{domain}/"),
                    Arc::new(PageSignals::default()),
                    category,
                    llm,
                    self.config.clone(),
                )?
            }
        };
        // Research is keyed by the analysed domain, not the sample page's subdomain.
        ctx.domain = domain.to_string();
        Ok(ctx
            .with_project(project.clone())
            .with_now(self.clock.now())
            .with_domain_pages(pages.iter().map(|p| p.signals.clone()).collect()))
    }
}

/// Category-weight-normalised mean of the dimension scores; plain mean when
/// every present dimension has zero weight.
pub fn overall_score(dimension_scores: &BTreeMap<Dimension, u8>, config: &ScoringConfig) -> u8 {
    if dimension_scores.is_empty() {
        return 0;
    }
    let (weighted, total) = dimension_scores
        .iter()
        .fold((0.0, 0.0), |(weighted, total), (dimension, score)| {
            let weight = config.category_weight(*dimension);
            (weighted + f64::from(*score) * weight, total + weight)
        });
    if total > 0.0 {
        clamp_score(weighted / total)
    } else {
        let sum: f64 = dimension_scores.values().map(|s| f64::from(*s)).sum();
        clamp_score(sum / dimension_scores.len() as f64)
    }
}

/// Accepts `example.com`, `WWW.Example.com` or a full URL; returns the bare host.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(normalize_host))
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ScoringError::InvalidDomain(raw.to_string()))
}
