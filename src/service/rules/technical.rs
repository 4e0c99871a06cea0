//! On-page technical hygiene: meta tags and indexability.

use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::page_extractor::normalize_host;

pub const META_TAGS_RULE_ID: &str = "technical.meta_tags";
pub const INDEXABILITY_RULE_ID: &str = "technical.indexability";

pub struct MetaTagsRule;

#[async_trait]
impl Rule for MetaTagsRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(META_TAGS_RULE_ID, "Meta tags", Dimension::Technical, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.technical;
        let content = &ctx.signals.content;
        let technical = &ctx.signals.technical;
        let mut score = 0.0;
        let mut outcome = RuleOutcome::default();

        match content.title.as_deref().map(|t| t.chars().count()) {
            Some(len) if (config.title_min_chars..=config.title_max_chars).contains(&len) => {
                score += f64::from(config.check_points);
                outcome = outcome.evidence(format!("Title length {len}"));
            }
            Some(len) => {
                outcome = outcome.issue(Issue::new(
                    Severity::Medium,
                    format!(
                        "Title is {len} characters (expected {}-{})",
                        config.title_min_chars, config.title_max_chars
                    ),
                    "Rewrite the title to a concise, descriptive length",
                ));
            }
            None => {
                outcome = outcome.issue(Issue::new(Severity::High, "Missing title tag", "Add a descriptive <title>"));
            }
        }

        match content.meta_description.as_deref().map(|d| d.chars().count()) {
            Some(len) if (config.description_min_chars..=config.description_max_chars).contains(&len) => {
                score += f64::from(config.check_points);
                outcome = outcome.evidence(format!("Meta description length {len}"));
            }
            Some(len) => {
                outcome = outcome.issue(Issue::new(
                    Severity::Medium,
                    format!(
                        "Meta description is {len} characters (expected {}-{})",
                        config.description_min_chars, config.description_max_chars
                    ),
                    "Write a meta description that summarises the page in one or two sentences",
                ));
            }
            None => {
                outcome = outcome.issue(Issue::new(
                    Severity::High,
                    "Missing meta description",
                    "Add a meta description summarising the page",
                ));
            }
        }

        if technical.canonical.is_some() {
            score += f64::from(config.check_points);
            outcome = outcome.evidence("Canonical link present");
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Missing canonical link",
                "Add <link rel=\"canonical\"> pointing at the preferred URL",
            ));
        }

        if technical.has_viewport {
            score += f64::from(config.check_points);
            outcome = outcome.evidence("Viewport meta present");
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Missing viewport meta tag",
                "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
            ));
        }

        if let Some(lang) = &technical.lang {
            score += f64::from(config.check_points);
            outcome = outcome.evidence(format!("Language declared: {lang}"));
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Low,
                "Missing lang attribute",
                "Declare the page language on the <html> element",
            ));
        }

        outcome.score = score;
        Ok(outcome)
    }
}

pub struct IndexabilityRule;

#[async_trait]
impl Rule for IndexabilityRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(INDEXABILITY_RULE_ID, "Indexability", Dimension::Technical, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.technical;
        let technical = &ctx.signals.technical;
        let mut outcome = RuleOutcome::default();

        let canonical_host = technical
            .canonical
            .as_deref()
            .and_then(|href| ctx.url.join(href).ok())
            .and_then(|url| url.host_str().map(normalize_host));
        let foreign_canonical = canonical_host.as_deref().is_some_and(|host| host != ctx.domain);

        let mut score = if technical.robots_noindex {
            outcome = outcome.evidence("robots meta contains noindex").issue(Issue::new(
                Severity::Critical,
                "Page is excluded from indexing (noindex)",
                "Remove noindex from the robots meta tag if the page should be found",
            ));
            f64::from(config.noindex_score)
        } else if foreign_canonical {
            let host = canonical_host.as_deref().unwrap_or_default();
            outcome = outcome.evidence(format!("Canonical points to {host}")).issue(Issue::new(
                Severity::High,
                format!("Canonical URL points to another host ({host})"),
                "Point the canonical link at this page unless it is intentionally syndicated",
            ));
            f64::from(config.foreign_canonical_score)
        } else {
            100.0
        };

        let mut alt_penalty = 0.0;
        if technical.image_count > 0 && technical.images_without_alt > 0 {
            let missing_share = technical.images_without_alt as f64 / technical.image_count as f64;
            alt_penalty = (missing_share * f64::from(config.max_alt_text_penalty)).round();
            score -= alt_penalty;
            outcome = outcome
                .evidence(format!(
                    "{} of {} images lack alt text",
                    technical.images_without_alt, technical.image_count
                ))
                .issue(Issue::new(
                    if missing_share > 0.5 { Severity::Medium } else { Severity::Low },
                    format!("{} images are missing alt text", technical.images_without_alt),
                    "Describe every meaningful image with an alt attribute",
                ));
        }

        outcome.score = score.max(0.0);
        Ok(outcome.details(json!({
            "noindex": technical.robots_noindex,
            "canonical_host": canonical_host,
            "foreign_canonical": foreign_canonical,
            "alt_text_penalty": alt_penalty,
        })))
    }
}
