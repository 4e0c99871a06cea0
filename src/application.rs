//! Application layer: wires config, LLM client and store into the page and
//! domain services and exposes the two inbound operations.

use std::sync::Arc;

use crate::config::ScoringConfig;
use crate::domain::{DomainAnalysisResult, PageContent, PageMetadata, PageScore, ProjectContext};
use crate::error::Result;
use crate::repository::{DomainAnalysisRepository, KeyValueStore, MemoryStore, PageScoreRepository};
use crate::service::cache::DomainResearchCache;
use crate::service::clock::{Clock, SystemClock};
use crate::service::domain_analysis::{DomainAnalysisInput, DomainAnalysisOrchestrator};
use crate::service::llm::{DisabledLlm, LlmClient, ResilientLlm};
use crate::service::rules::RuleRegistry;
use crate::service::scoring::AeoScoringService;

#[derive(Default)]
pub struct ContentKpiEngineBuilder {
    config: Option<ScoringConfig>,
    llm: Option<Arc<dyn LlmClient>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    retries: bool,
}

impl ContentKpiEngineBuilder {
    pub fn config(mut self, config: ScoringConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Skip the retry/timeout wrapper around the LLM client.
    pub fn without_retries(mut self) -> Self {
        self.retries = false;
        self
    }

    /// Validate the config and assemble the engine. Defaults: in-memory store,
    /// no LLM, system clock.
    pub fn build(self) -> Result<ContentKpiEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let config = Arc::new(config);

        let inner = self.llm.unwrap_or_else(|| Arc::new(DisabledLlm));
        let llm: Arc<dyn LlmClient> = if self.retries {
            Arc::new(ResilientLlm::new(inner, config.llm.retry.clone()))
        } else {
            inner
        };
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let research_cache = Arc::new(DomainResearchCache::new());
        let registry = Arc::new(RuleRegistry::with_default_rules(&config, research_cache.clone()));
        tracing::info!("Scoring engine ready with {} rules", registry.len());

        let domain_repository = DomainAnalysisRepository::new(store.clone());
        let scoring = AeoScoringService::new(config.clone(), registry.clone()).with_clock(clock.clone());
        let domains = DomainAnalysisOrchestrator::new(config, registry, domain_repository.clone())
            .with_research_cache(research_cache.clone())
            .with_clock(clock);

        Ok(ContentKpiEngine {
            scoring,
            domains,
            page_scores: PageScoreRepository::new(store),
            domain_analyses: domain_repository,
            research_cache,
            llm,
        })
    }
}

pub struct ContentKpiEngine {
    scoring: AeoScoringService,
    domains: DomainAnalysisOrchestrator,
    page_scores: PageScoreRepository,
    domain_analyses: DomainAnalysisRepository,
    research_cache: Arc<DomainResearchCache>,
    llm: Arc<dyn LlmClient>,
}

impl ContentKpiEngine {
    pub fn builder() -> ContentKpiEngineBuilder {
        ContentKpiEngineBuilder {
            retries: true,
            ..Default::default()
        }
    }

    /// Score one page and persist the result.
    pub async fn evaluate_page(
        &self,
        url: &str,
        html: &str,
        metadata: PageMetadata,
        project: &ProjectContext,
    ) -> Result<PageScore> {
        let content = PageContent::new(url, html).with_metadata(metadata);
        let score = self
            .scoring
            .calculate_score(url, &content, project, self.llm.clone())
            .await?;

        match self.page_scores.save(&score).await {
            Ok(id) => tracing::debug!("Stored page score {} for {}", id, score.url),
            Err(e) => tracing::warn!("Failed to persist page score for {}: {}", score.url, e),
        }
        Ok(score)
    }

    /// Domain analysis, served from cache while it is fresh.
    pub async fn evaluate_domain(
        &self,
        domain: &str,
        project_id: &str,
        project: ProjectContext,
        pages: Vec<PageContent>,
    ) -> Result<DomainAnalysisResult> {
        let input = DomainAnalysisInput {
            domain: domain.to_string(),
            project_id: project_id.to_string(),
            project,
            pages,
        };
        self.domains.analyze_domain(input, self.llm.clone()).await
    }

    /// Discard the cached analysis and research for the domain, then recompute.
    pub async fn refresh_domain(
        &self,
        domain: &str,
        project_id: &str,
        project: ProjectContext,
        pages: Vec<PageContent>,
    ) -> Result<DomainAnalysisResult> {
        let input = DomainAnalysisInput {
            domain: domain.to_string(),
            project_id: project_id.to_string(),
            project,
            pages,
        };
        self.domains.refresh_domain_analysis(input, self.llm.clone()).await
    }

    pub fn scoring(&self) -> &AeoScoringService {
        &self.scoring
    }

    pub fn page_scores(&self) -> &PageScoreRepository {
        &self.page_scores
    }

    pub fn domain_analyses(&self) -> &DomainAnalysisRepository {
        &self.domain_analyses
    }

    pub fn research_cache(&self) -> &Arc<DomainResearchCache> {
        &self.research_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dimension;
    use crate::error::ScoringError;
    use crate::service::clock::FixedClock;
    use crate::test_utils::{fixed_now, html, ScriptedLlm};

    fn engine(llm: Arc<ScriptedLlm>, store: Arc<MemoryStore>) -> ContentKpiEngine {
        ContentKpiEngine::builder()
            .llm(llm)
            .store(store)
            .clock(Arc::new(FixedClock(fixed_now())))
            .without_retries()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn evaluated_pages_are_persisted() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(Arc::new(ScriptedLlm::new().fail_all()), store.clone());
        let score = engine
            .evaluate_page(
                "https://example.com/blog/post",
                html::BLOG_POST,
                PageMetadata::default(),
                &ProjectContext::default(),
            )
            .await
            .unwrap();

        let stored = engine.page_scores().find_latest(&score.url).await.unwrap().unwrap();
        assert_eq!(stored.global_score, score.global_score);
        assert_eq!(stored.category_scores, score.category_scores);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn read_only_store_does_not_fail_page_runs() {
        let engine = engine(Arc::new(ScriptedLlm::new()), Arc::new(MemoryStore::read_only()));
        let score = engine
            .evaluate_page("https://example.com/faq", html::FAQ_PAGE, PageMetadata::default(), &ProjectContext::default())
            .await
            .unwrap();
        assert!(score.global_score <= 100);
    }

    #[tokio::test]
    async fn domain_runs_use_the_shared_cache() {
        let llm = Arc::new(ScriptedLlm::new().respond("Research the website", "classification: LOW"));
        let engine = engine(llm.clone(), Arc::new(MemoryStore::new()));
        let pages = vec![PageContent::new("https://example.com/faq", html::FAQ_PAGE)];

        let first = engine
            .evaluate_domain("example.com", "p", ProjectContext::default(), pages.clone())
            .await
            .unwrap();
        assert_eq!(first.dimension_scores[&Dimension::Authority], 35);
        assert!(engine.research_cache().get("example.com").is_some());

        let cached = engine
            .evaluate_domain("example.com", "p", ProjectContext::default(), pages.clone())
            .await
            .unwrap();
        assert!(cached.metadata.from_cache);

        let refreshed = engine
            .refresh_domain("example.com", "p", ProjectContext::default(), pages)
            .await
            .unwrap();
        assert!(!refreshed.metadata.from_cache);
        assert_eq!(llm.calls(), 2);
        let latest = engine.domain_analyses().find_latest("example.com", "p").await.unwrap().unwrap();
        assert_eq!(latest.id, refreshed.id);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ScoringConfig::default();
        config.category_weights.insert(Dimension::Brand, -1.0);
        let result = ContentKpiEngine::builder().config(config).build();
        assert!(matches!(result, Err(ScoringError::Config(_))));
    }
}
