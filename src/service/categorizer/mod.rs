//! Page categorization: URL fast path, then the model, then the detection table.

pub mod detection;

use serde::Deserialize;
use url::Url;

use crate::config::{CategorizerConfig, LlmConfig};
use crate::domain::{CategorySource, CategoryType, PageCategory, PageSignals};
use crate::extractor::truncate_chars;
use crate::service::llm::{parse_json_response, CallOptions, LlmClient};

use detection::{detect, DetectionInput};

#[derive(Debug, Deserialize)]
struct LlmCategory {
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reason: String,
}

/// What the categorizer needs to know about a page.
pub struct CategorizationInput<'a> {
    pub url: &'a Url,
    pub html: &'a str,
    pub signals: &'a PageSignals,
    pub clean_content: &'a str,
}

#[derive(Debug, Clone)]
pub struct PageCategorizer {
    config: CategorizerConfig,
    llm_config: LlmConfig,
}

impl PageCategorizer {
    pub fn new(config: CategorizerConfig, llm_config: LlmConfig) -> Self {
        Self { config, llm_config }
    }

    pub async fn categorize(&self, input: &CategorizationInput<'_>, llm: &dyn LlmClient) -> PageCategory {
        if let Some(category) = self.fast_path(input.url) {
            tracing::debug!("{} categorized by URL as {}", input.url, category.category_type.as_str());
            return category;
        }

        if self.config.use_llm {
            if let Some(category) = self.llm_tier(input, llm).await {
                tracing::debug!(
                    "{} categorized by LLM as {} ({:.2})",
                    input.url,
                    category.category_type.as_str(),
                    category.confidence
                );
                return category;
            }
        }

        let category = self.rule_tier(input);
        tracing::debug!(
            "{} categorized by {:?} as {} ({:.2})",
            input.url,
            category.source,
            category.category_type.as_str(),
            category.confidence
        );
        category
    }

    /// URL-only verdicts for the pages that need no content to identify.
    pub fn fast_path(&self, url: &Url) -> Option<PageCategory> {
        let path = url.path().trim_end_matches('/').to_ascii_lowercase();
        let first_segment = path.trim_start_matches('/').split('/').next().unwrap_or("");

        let (category, reason) = if path.is_empty() || matches!(path.as_str(), "/index.html" | "/index.php" | "/home") {
            (CategoryType::Homepage, "site root")
        } else if matches!(first_segment, "404" | "error" | "404.html" | "error.html") {
            (CategoryType::Error, "error page URL")
        } else if matches!(first_segment, "login" | "signin" | "sign-in" | "signup" | "sign-up") {
            (CategoryType::Login, "authentication URL")
        } else {
            return None;
        };

        // A fast-path verdict has to beat anything the detection tier can produce.
        if self.config.fast_path_confidence <= self.config.rule_confidence_cap {
            return None;
        }
        Some(PageCategory::new(
            category,
            self.config.fast_path_confidence,
            CategorySource::UrlPattern,
            reason,
        ))
    }

    fn prompt(&self, input: &CategorizationInput<'_>) -> String {
        let slugs: Vec<&str> = CategoryType::ALL.iter().map(|c| c.as_str()).collect();
        format!(
            "Classify this web page into exactly one category.\n\
             Categories: {categories}\n\
             URL: {url}\n\
             Title: {title}\n\
             Meta description: {description}\n\
             Content excerpt:\n{content}\n\n\
             Respond with JSON only: {{\"category\": \"<one of the categories>\", \"confidence\": 0.0-1.0, \"reason\": \"...\"}}",
            categories = slugs.join(", "),
            url = input.url,
            title = input.signals.content.title.as_deref().unwrap_or(""),
            description = input.signals.content.meta_description.as_deref().unwrap_or(""),
            content = truncate_chars(input.clean_content, self.config.prompt_content_chars),
        )
    }

    async fn llm_tier(&self, input: &CategorizationInput<'_>, llm: &dyn LlmClient) -> Option<PageCategory> {
        let options = CallOptions::analysis(&self.llm_config);
        let response = match llm.call(self.llm_config.analysis_provider, &self.prompt(input), &options).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("LLM categorization unavailable for {}: {}", input.url, e);
                return None;
            }
        };

        let parsed: LlmCategory = parse_json_response(&response.text)?;
        let category = CategoryType::from_slug(&parsed.category)?;
        if category == CategoryType::Unknown || parsed.confidence < self.config.min_llm_confidence {
            tracing::debug!(
                "LLM categorization for {} rejected ({} at {:.2})",
                input.url,
                parsed.category,
                parsed.confidence
            );
            return None;
        }
        Some(PageCategory::new(category, parsed.confidence, CategorySource::Llm, parsed.reason))
    }

    fn rule_tier(&self, input: &CategorizationInput<'_>) -> PageCategory {
        let url_path = match input.url.query() {
            Some(query) => format!("{}?{}", input.url.path(), query),
            None => input.url.path().to_string(),
        };
        let content = &input.signals.content;
        let meta_text = format!(
            "{} {}",
            content.title.as_deref().unwrap_or(""),
            content.meta_description.as_deref().unwrap_or("")
        );

        let detection = detect(&DetectionInput {
            url_path: &url_path,
            meta_text: &meta_text,
            content: input.clean_content,
            html: input.html,
            schema_types: &input.signals.structure.schema_types,
        });

        match detection {
            Some(detection) => PageCategory::new(
                detection.category,
                detection.score.min(self.config.rule_confidence_cap),
                CategorySource::RuleBased,
                format!("matched {}", detection.matched_classes.join(", ")),
            ),
            None => PageCategory::unknown(self.config.unknown_confidence, "no detection rule matched"),
        }
    }
}
