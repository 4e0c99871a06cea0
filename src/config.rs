//! Scoring configuration.
//!
//! Every product-tunable number the engine uses lives here: weight tables,
//! bucket tables, trusted-domain and keyword lists, severity cut points and the
//! LLM retry policy. Each section falls back to its `Default` when omitted from
//! the JSON file, so a config file only needs to carry the values it changes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Dimension;
use crate::error::ConfigError;

/// "value >= min scores `score`" table entry. Tables are ordered by descending `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub min: f64,
    pub score: u8,
}

const fn bucket(min: f64, score: u8) -> ThresholdBucket {
    ThresholdBucket { min, score }
}

/// "age <= max_days scores `score`" table entry. Ordered by ascending `max_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub max_days: i64,
    pub score: u8,
}

/// "average words per sentence <= max_words earns `points`".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentenceLengthBucket {
    pub max_words: f64,
    pub points: u8,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// ROOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of each top-level category in the global score. Entries given in
    /// a file override the defaults one by one.
    #[serde(deserialize_with = "merge_category_weights")]
    pub category_weights: BTreeMap<Dimension, f64>,
    /// Per-rule overrides keyed by rule id.
    pub rules: BTreeMap<String, RuleOverride>,
    pub authority: AuthorityConfig,
    pub llm_eeat: LlmEeatConfig,
    pub freshness: FreshnessConfig,
    pub structure: StructureConfig,
    pub snippet: SnippetConfig,
    pub brand: BrandConfig,
    pub technical: TechnicalConfig,
    pub quality: QualityConfig,
    pub domain_authority: DomainAuthorityConfig,
    pub severity: SeverityThresholds,
    pub categorizer: CategorizerConfig,
    pub llm: LlmConfig,
    pub domain_analysis: DomainAnalysisConfig,
    pub limits: ContentLimits,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let category_weights = [
            (Dimension::Authority, 0.20),
            (Dimension::Freshness, 0.10),
            (Dimension::Structure, 0.20),
            (Dimension::Snippet, 0.15),
            (Dimension::Brand, 0.10),
            (Dimension::Technical, 0.10),
            (Dimension::Quality, 0.15),
        ]
        .into_iter()
        .collect();

        Self {
            category_weights,
            rules: BTreeMap::new(),
            authority: AuthorityConfig::default(),
            llm_eeat: LlmEeatConfig::default(),
            freshness: FreshnessConfig::default(),
            structure: StructureConfig::default(),
            snippet: SnippetConfig::default(),
            brand: BrandConfig::default(),
            technical: TechnicalConfig::default(),
            quality: QualityConfig::default(),
            domain_authority: DomainAuthorityConfig::default(),
            severity: SeverityThresholds::default(),
            categorizer: CategorizerConfig::default(),
            llm: LlmConfig::default(),
            domain_analysis: DomainAnalysisConfig::default(),
            limits: ContentLimits::default(),
        }
    }
}

fn merge_category_weights<'de, D>(deserializer: D) -> Result<BTreeMap<Dimension, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = BTreeMap::<Dimension, f64>::deserialize(deserializer)?;
    let mut weights = ScoringConfig::default().category_weights;
    weights.extend(overrides);
    Ok(weights)
}

impl ScoringConfig {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn category_weight(&self, dimension: Dimension) -> f64 {
        self.category_weights.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn rule_override(&self, rule_id: &str) -> RuleOverride {
        self.rules.get(rule_id).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (dimension, weight) in &self.category_weights {
            check_weight(&format!("category_weights.{dimension}"), *weight)?;
        }
        for (id, rule) in &self.rules {
            if let Some(weight) = rule.weight {
                check_weight(&format!("rules.{id}.weight"), weight)?;
            }
        }

        let s = &self.severity;
        if !(s.critical < s.high && s.high < s.medium && s.medium <= 100) {
            return Err(ConfigError::invalid(
                "severity",
                format!(
                    "cut points must be ascending and <= 100 (got {}/{}/{})",
                    s.critical, s.high, s.medium
                ),
            ));
        }

        check_descending("brand.match_buckets", &self.brand.match_buckets)?;
        check_descending("quality.depth_buckets", &self.quality.depth_buckets)?;
        check_descending("domain_authority.coverage_buckets", &self.domain_authority.coverage_buckets)?;

        if self
            .freshness
            .age_buckets
            .windows(2)
            .any(|w| w[0].max_days >= w[1].max_days)
        {
            return Err(ConfigError::invalid(
                "freshness.age_buckets",
                "max_days must be strictly ascending",
            ));
        }
        if self
            .structure
            .readability_buckets
            .windows(2)
            .any(|w| w[0].max_words >= w[1].max_words)
        {
            return Err(ConfigError::invalid(
                "structure.readability_buckets",
                "max_words must be strictly ascending",
            ));
        }

        if !(0.0..=1.0).contains(&self.authority.trusted_fraction) {
            return Err(ConfigError::invalid(
                "authority.trusted_fraction",
                "must be within 0.0..=1.0",
            ));
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("llm.retry.max_attempts", "must be at least 1"));
        }
        if self.llm.retry.timeout_secs == 0 {
            return Err(ConfigError::invalid("llm.retry.timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

fn check_weight(field: &str, weight: f64) -> Result<(), ConfigError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("weight must be finite and >= 0 (got {weight})")))
    }
}

fn check_descending(field: &str, buckets: &[ThresholdBucket]) -> Result<(), ConfigError> {
    if buckets.windows(2).any(|w| w[0].min <= w[1].min) {
        return Err(ConfigError::invalid(field, "min must be strictly descending"));
    }
    Ok(())
}

// ============================================================================
// RULE OVERRIDES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOverride {
    pub enabled: bool,
    pub weight: Option<f64>,
}

impl Default for RuleOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: None,
        }
    }
}

// ============================================================================
// RULE SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub base_score: u8,
    pub author_points: u8,
    pub credential_points: u8,
    pub citation_points: u8,
    pub trusted_citation_points: u8,
    pub min_citations: usize,
    pub trusted_fraction: f64,
    /// Characters searched on each side of an author name for credentials.
    pub credential_window_chars: usize,
    pub credential_keywords: Vec<String>,
    pub trusted_domains: Vec<String>,
    pub generic_author_names: Vec<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_score: 20,
            author_points: 20,
            credential_points: 20,
            citation_points: 20,
            trusted_citation_points: 20,
            min_citations: 2,
            trusted_fraction: 0.5,
            credential_window_chars: 100,
            credential_keywords: strings(&[
                "PhD", "Ph.D.", "Professor", "Prof.", "Dr.", "MD", "M.D.", "Certified", "CPA",
                "CFA", "MBA", "RN", "Esq.", "Licensed", "Board-certified", "Fellow",
            ]),
            trusted_domains: strings(&[
                "gov", "edu", "ieee.org", "nature.com", "wikipedia.org", "who.int", "nih.gov",
                "acm.org", "sciencedirect.com", "springer.com", "arxiv.org", "reuters.com",
            ]),
            generic_author_names: strings(&[
                "admin", "administrator", "staff", "team", "editor", "editorial team", "guest",
                "anonymous", "author", "webmaster", "marketing", "unknown",
            ]),
        }
    }
}

/// Points awarded by the model-judged E-E-A-T rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmEeatConfig {
    pub base_score: u8,
    pub author_points: u8,
    pub credential_points: u8,
    pub experience_points: u8,
    pub trust_signal_points: u8,
    pub max_trust_signals: usize,
}

impl Default for LlmEeatConfig {
    fn default() -> Self {
        Self {
            base_score: 20,
            author_points: 25,
            credential_points: 25,
            experience_points: 15,
            trust_signal_points: 5,
            max_trust_signals: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    pub age_buckets: Vec<AgeBucket>,
    pub stale_score: u8,
    pub missing_score: u8,
    /// Dates up to this far in the future are accepted as clock skew.
    pub max_future_skew_days: i64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            age_buckets: vec![
                AgeBucket { max_days: 90, score: 100 },
                AgeBucket { max_days: 180, score: 80 },
                AgeBucket { max_days: 365, score: 60 },
            ],
            stale_score: 40,
            missing_score: 20,
            max_future_skew_days: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub base_score: u8,
    pub single_h1_points: u8,
    pub multiple_h1_points: u8,
    pub valid_hierarchy_points: u8,
    pub broken_hierarchy_points: u8,
    pub schema_points: u8,
    pub schema_fields_bonus: u8,
    pub relevant_schema_types: Vec<String>,
    pub readability_buckets: Vec<SentenceLengthBucket>,
    pub readability_floor: u8,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            base_score: 20,
            single_h1_points: 20,
            multiple_h1_points: 10,
            valid_hierarchy_points: 20,
            broken_hierarchy_points: 10,
            schema_points: 20,
            schema_fields_bonus: 10,
            relevant_schema_types: strings(&[
                "Article", "NewsArticle", "BlogPosting", "TechArticle", "FAQPage", "QAPage",
                "HowTo", "Product", "Service", "Review", "Organization", "LocalBusiness",
                "WebPage", "BreadcrumbList",
            ]),
            readability_buckets: vec![
                SentenceLengthBucket { max_words: 20.0, points: 20 },
                SentenceLengthBucket { max_words: 25.0, points: 15 },
                SentenceLengthBucket { max_words: 30.0, points: 10 },
            ],
            readability_floor: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub base_score: u8,
    pub list_points: u8,
    pub qa_points: u8,
    pub short_paragraph_points: u8,
    pub short_paragraph_partial_points: u8,
    pub table_points: u8,
    pub wall_of_text_penalty: u8,
    pub short_paragraph_max_words: usize,
    pub long_paragraph_min_words: usize,
    pub wall_of_text_min_long_paragraphs: usize,
    pub short_share_full: f64,
    pub short_share_partial: f64,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            base_score: 20,
            list_points: 20,
            qa_points: 20,
            short_paragraph_points: 20,
            short_paragraph_partial_points: 10,
            table_points: 10,
            wall_of_text_penalty: 20,
            short_paragraph_max_words: 60,
            long_paragraph_min_words: 150,
            wall_of_text_min_long_paragraphs: 3,
            short_share_full: 0.6,
            short_share_partial: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    /// Match percentage buckets (0-100).
    pub match_buckets: Vec<ThresholdBucket>,
    pub any_match_score: u8,
    pub no_match_score: u8,
    pub neutral_score: u8,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            match_buckets: vec![bucket(80.0, 100), bucket(60.0, 80), bucket(40.0, 60), bucket(20.0, 40)],
            any_match_score: 30,
            no_match_score: 20,
            neutral_score: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub title_min_chars: usize,
    pub title_max_chars: usize,
    pub description_min_chars: usize,
    pub description_max_chars: usize,
    /// Points per satisfied meta-tag check.
    pub check_points: u8,
    pub noindex_score: u8,
    pub foreign_canonical_score: u8,
    pub max_alt_text_penalty: u8,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            title_min_chars: 10,
            title_max_chars: 60,
            description_min_chars: 50,
            description_max_chars: 160,
            check_points: 20,
            noindex_score: 10,
            foreign_canonical_score: 40,
            max_alt_text_penalty: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Word-count buckets.
    pub depth_buckets: Vec<ThresholdBucket>,
    pub depth_floor: u8,
    pub answers_questions_bonus: u8,
    pub prompt_content_chars: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            depth_buckets: vec![bucket(1500.0, 100), bucket(800.0, 80), bucket(300.0, 60), bucket(100.0, 40)],
            depth_floor: 20,
            answers_questions_bonus: 10,
            prompt_content_chars: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainAuthorityConfig {
    pub high_score: u8,
    pub medium_score: u8,
    pub low_score: u8,
    pub unknown_score: u8,
    /// Share of pages (0-100) carrying relevant schema markup.
    pub coverage_buckets: Vec<ThresholdBucket>,
    pub coverage_any_score: u8,
    pub coverage_none_score: u8,
}

impl Default for DomainAuthorityConfig {
    fn default() -> Self {
        Self {
            high_score: 90,
            medium_score: 65,
            low_score: 35,
            unknown_score: 25,
            coverage_buckets: vec![bucket(80.0, 100), bucket(50.0, 75), bucket(20.0, 50)],
            coverage_any_score: 35,
            coverage_none_score: 20,
        }
    }
}

// ============================================================================
// SEVERITY / CATEGORIZER / LLM / DOMAIN
// ============================================================================

/// Scores below `critical` are critical, below `high` high, below `medium` medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 35,
            high: 60,
            medium: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    pub use_llm: bool,
    pub min_llm_confidence: f64,
    pub prompt_content_chars: usize,
    pub fast_path_confidence: f64,
    pub rule_confidence_cap: f64,
    pub unknown_confidence: f64,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            min_llm_confidence: 0.6,
            prompt_content_chars: 2000,
            fast_path_confidence: 0.95,
            rule_confidence_cap: 0.9,
            unknown_confidence: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Perplexity,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Perplexity => "perplexity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub analysis_provider: LlmProvider,
    pub analysis_model: String,
    pub research_provider: LlmProvider,
    pub research_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub research_max_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            analysis_provider: LlmProvider::Gemini,
            analysis_model: "gemini-2.0-flash".to_string(),
            research_provider: LlmProvider::Perplexity,
            research_model: "sonar".to_string(),
            temperature: 0.0,
            max_tokens: 800,
            research_max_tokens: 1200,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainAnalysisConfig {
    pub cache_validity_hours: i64,
    pub neutral_score: u8,
}

impl Default for DomainAnalysisConfig {
    fn default() -> Self {
        Self {
            cache_validity_hours: 24,
            neutral_score: 50,
        }
    }
}

/// Caps that bound CPU work and prompt size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentLimits {
    pub max_clean_content_chars: usize,
    pub max_list_items: usize,
    pub max_heading_chars: usize,
    pub main_content_min_chars: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_clean_content_chars: 8000,
            max_list_items: 50,
            max_heading_chars: 120,
            main_content_min_chars: 200,
        }
    }
}
