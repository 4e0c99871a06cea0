//! Page scoring: categorize, run every applicable dimension concurrently and roll
//! the dimension scores up into one global score.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use crate::config::ScoringConfig;
use crate::domain::{
    clamp_score, CategoryScore, Dimension, Issue, PageCategory, PageContent, PageScore, ProjectContext,
    Severity,
};
use crate::error::Result;
use crate::extractor::SignalExtractor;
use crate::service::aggregator::{Aggregation, ConditionalAggregator};
use crate::service::categorizer::{CategorizationInput, PageCategorizer};
use crate::service::clock::{Clock, SystemClock};
use crate::service::issues::{unique_recommendations, IssueCollector};
use crate::service::llm::LlmClient;
use crate::service::rules::{parse_page_url, run_rule, RuleContext, RuleRegistry, Scope};

pub struct AeoScoringService {
    config: Arc<ScoringConfig>,
    registry: Arc<RuleRegistry>,
    extractor: SignalExtractor,
    categorizer: PageCategorizer,
    clock: Arc<dyn Clock>,
}

impl AeoScoringService {
    pub fn new(config: Arc<ScoringConfig>, registry: Arc<RuleRegistry>) -> Self {
        Self {
            extractor: SignalExtractor::new(config.limits.clone()),
            categorizer: PageCategorizer::new(config.categorizer.clone(), config.llm.clone()),
            config,
            registry,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Arc<ScoringConfig> {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn extractor(&self) -> &SignalExtractor {
        &self.extractor
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Score one page. Only an unusable URL fails; everything else degrades.
    pub async fn calculate_score(
        &self,
        url: &str,
        content: &PageContent,
        project: &ProjectContext,
        llm: Arc<dyn LlmClient>,
    ) -> Result<PageScore> {
        let (page_url, _) = parse_page_url(url)?;
        let signals = Arc::new(self.extractor.extract(&content.html, &content.metadata, page_url.as_str()));
        let clean_content = self.extractor.clean_content(&content.html);
        let now = self.clock.now();

        let category = self
            .categorizer
            .categorize(
                &CategorizationInput {
                    url: &page_url,
                    html: &content.html,
                    signals: &signals,
                    clean_content: &clean_content,
                },
                llm.as_ref(),
            )
            .await;

        if category.is_excluded() {
            tracing::info!(
                "Skipping {}: {} pages are not scored",
                page_url,
                category.category_type.as_str()
            );
            return Ok(skipped_score(page_url.as_str(), category, now));
        }

        let ctx = RuleContext::new(page_url.as_str(), signals, category.clone(), llm, self.config.clone())?
            .with_html(&content.html, clean_content)
            .with_metadata(content.metadata.clone())
            .with_project(project.clone())
            .with_now(now);

        let dimensions = join_all(category.dimensions.iter().map(|&dimension| self.score_dimension(dimension, &ctx))).await;

        let mut category_scores = empty_category_scores();
        let mut collector = IssueCollector::new();
        for (score, issues) in dimensions {
            collector.extend(issues);
            category_scores.insert(score.dimension, score);
        }

        let global_score = global_score(&category_scores, &category, &self.config);
        let issues = collector.into_sorted();
        let critical_issues = issues.iter().filter(|i| i.severity == Severity::Critical).count();
        tracing::info!(
            "Scored {} as {} : global {} with {} issues",
            page_url,
            category.category_type.as_str(),
            global_score,
            issues.len()
        );

        Ok(PageScore {
            url: page_url.to_string(),
            page_type: category.category_type,
            page_category: category,
            timestamp: now,
            category_scores,
            global_score,
            total_issues: issues.len(),
            critical_issues,
            recommendations: unique_recommendations(&issues),
            issues,
            skip_reason: None,
        })
    }

    /// Run the dimension's page rules concurrently and aggregate them.
    async fn score_dimension(&self, dimension: Dimension, ctx: &RuleContext) -> (CategoryScore, Vec<Issue>) {
        let rules = self
            .registry
            .get_rules_for_dimension(dimension, ctx.category.category_type, Scope::Page);
        if rules.is_empty() {
            return (CategoryScore::empty(dimension), Vec::new());
        }

        let results = join_all(rules.iter().map(|rule| run_rule(rule, ctx))).await;
        let aggregation = ConditionalAggregator::aggregate(dimension, &results);
        tracing::debug!(
            "{} {} = {} from {} rules",
            ctx.url,
            dimension,
            aggregation.final_score,
            results.len()
        );
        category_score(dimension, aggregation)
    }
}

/// Turn an aggregation into the dimension's rollup plus its pooled issues.
pub fn category_score(dimension: Dimension, aggregation: Aggregation) -> (CategoryScore, Vec<Issue>) {
    let Aggregation {
        final_score,
        calculation_details,
        rule_results,
        issues,
    } = aggregation;

    let score = CategoryScore {
        dimension,
        score: final_score,
        applied_rules: rule_results.len(),
        passed_rules: rule_results.iter().filter(|r| r.passed).count(),
        issues: issues.iter().map(|i| i.description.clone()).collect(),
        recommendations: unique_recommendations(&issues),
        rule_results,
        calculation_details,
    };
    (score, issues)
}

/// Every dimension present with an empty score.
pub fn empty_category_scores() -> BTreeMap<Dimension, CategoryScore> {
    Dimension::ALL
        .into_iter()
        .map(|dimension| (dimension, CategoryScore::empty(dimension)))
        .collect()
}

/// `round(sum(score * weight * modifier) / sum(weight * modifier))` over the
/// dimensions that applied at least one rule.
pub fn global_score(
    scores: &BTreeMap<Dimension, CategoryScore>,
    category: &PageCategory,
    config: &ScoringConfig,
) -> u8 {
    let (weighted, total) = scores
        .values()
        .filter(|score| score.applied_rules > 0)
        .fold((0.0, 0.0), |(weighted, total), score| {
            let weight = config.category_weight(score.dimension) * category.weight_modifier(score.dimension);
            (weighted + f64::from(score.score) * weight, total + weight)
        });
    if total > 0.0 {
        clamp_score(weighted / total)
    } else {
        0
    }
}

fn skipped_score(url: &str, category: PageCategory, now: chrono::DateTime<chrono::Utc>) -> PageScore {
    let reason = format!(
        "{} pages are excluded from scoring ({})",
        category.category_type.as_str(),
        category.reason
    );
    PageScore {
        url: url.to_string(),
        page_type: category.category_type,
        page_category: category,
        timestamp: now,
        category_scores: empty_category_scores(),
        global_score: 0,
        total_issues: 0,
        critical_issues: 0,
        issues: Vec::new(),
        recommendations: Vec::new(),
        skip_reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategorySource, CategoryType};
    use crate::service::cache::DomainResearchCache;
    use crate::service::clock::FixedClock;
    use crate::test_utils::{fixed_now, html, ScriptedLlm, StaticRule};

    fn service(registry: RuleRegistry) -> AeoScoringService {
        AeoScoringService::new(Arc::new(ScoringConfig::default()), Arc::new(registry))
            .with_clock(Arc::new(FixedClock(fixed_now())))
    }

    fn default_service() -> AeoScoringService {
        let config = ScoringConfig::default();
        let registry = RuleRegistry::with_default_rules(&config, Arc::new(DomainResearchCache::new()));
        service(registry)
    }

    #[tokio::test]
    async fn excluded_pages_are_skipped_with_every_dimension_present() {
        let llm = Arc::new(ScriptedLlm::new());
        let page = PageContent::new("https://example.com/login", "<html><body><form></form></body></html>");
        let score = default_service()
            .calculate_score(&page.url, &page, &ProjectContext::default(), llm.clone())
            .await
            .unwrap();

        assert!(score.is_skipped());
        assert_eq!(score.page_type, CategoryType::Login);
        assert_eq!(score.global_score, 0);
        assert_eq!(score.category_scores.len(), Dimension::ALL.len());
        assert!(score.category_scores.values().all(|c| c.applied_rules == 0 && c.score == 0));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn blog_post_scores_every_dimension_within_bounds() {
        let llm = Arc::new(ScriptedLlm::new().fail_all());
        let page = PageContent::new("https://example.com/blog/post", html::BLOG_POST);
        let score = default_service()
            .calculate_score(&page.url, &page, &ProjectContext::default(), llm)
            .await
            .unwrap();

        assert_eq!(score.page_type, CategoryType::BlogArticle);
        assert_eq!(score.category_scores.len(), Dimension::ALL.len());
        for category in score.category_scores.values() {
            assert!(category.applied_rules > 0, "{} had no rules", category.dimension);
            assert!(category.score <= 100);
            assert_eq!(category.calculation_details.recompute(), category.score);
        }
        assert_eq!(score.category(Dimension::Structure).unwrap().score, 100);
        assert!(score.global_score <= 100);
        assert!(score.issues.windows(2).all(|w| w[0].severity <= w[1].severity));
    }

    #[tokio::test]
    async fn global_score_uses_only_dimensions_with_rules() {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(StaticRule::scoring("s", Dimension::Structure, 80.0)));
        registry.register(Arc::new(StaticRule::scoring("t", Dimension::Technical, 40.0)));
        registry.register(Arc::new(StaticRule::failing("b", Dimension::Brand)));

        let page = PageContent::new("https://example.com/misc", "<html><body><p>Hello there.</p></body></html>");
        let score = service(registry)
            .calculate_score(&page.url, &page, &ProjectContext::default(), Arc::new(ScriptedLlm::new()))
            .await
            .unwrap();

        assert_eq!(score.page_type, CategoryType::Unknown);
        // (80 * 0.2 + 40 * 0.1 + 0 * 0.1) / 0.4
        assert_eq!(score.global_score, 50);
        let brand = score.category(Dimension::Brand).unwrap();
        assert_eq!(brand.applied_rules, 1);
        assert_eq!(brand.passed_rules, 0);
        assert_eq!(score.category(Dimension::Authority).unwrap().applied_rules, 0);
        assert_eq!(score.issues[0].severity, Severity::High);
        assert!(score.issues[0].description.starts_with("Rule execution failed"));
        assert_eq!(score.total_issues, 1);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let service = default_service();
        let page = PageContent::new("https://example.com/faq", html::FAQ_PAGE);
        let mut globals = Vec::new();
        for _ in 0..2 {
            let llm = Arc::new(ScriptedLlm::new().fail_all());
            let score = service
                .calculate_score(&page.url, &page, &ProjectContext::brand("Acme"), llm)
                .await
                .unwrap();
            globals.push((score.global_score, score.category_scores.clone()));
        }
        assert_eq!(globals[0], globals[1]);
    }

    #[tokio::test]
    async fn invalid_url_is_the_only_hard_failure() {
        let page = PageContent::new("not a url", "<html></html>");
        let result = default_service()
            .calculate_score(&page.url, &page, &ProjectContext::default(), Arc::new(ScriptedLlm::new()))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn weight_modifiers_shift_the_global_score() {
        let mut scores = empty_category_scores();
        for (dimension, value) in [(Dimension::Authority, 100), (Dimension::Structure, 0)] {
            let score = scores.get_mut(&dimension).unwrap();
            score.score = value;
            score.applied_rules = 1;
        }
        let config = ScoringConfig::default();
        let plain = PageCategory::unknown(0.1, "test");
        let blog = PageCategory::new(CategoryType::BlogArticle, 0.9, CategorySource::RuleBased, "test");

        // Equal weights: 50. Authority x1.2 on blogs: 24 / 44
        assert_eq!(global_score(&scores, &plain, &config), 50);
        assert_eq!(global_score(&scores, &blog, &config), 55);
    }

    #[test]
    fn no_applied_rules_means_zero_global() {
        let config = ScoringConfig::default();
        assert_eq!(global_score(&empty_category_scores(), &PageCategory::unknown(0.1, ""), &config), 0);
    }
}
