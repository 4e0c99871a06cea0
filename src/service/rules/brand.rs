use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::contains_term;
use crate::service::aggregator::bucket_score;

pub const RULE_ID: &str = "brand.alignment";

pub struct BrandAlignmentRule;

struct SectionMatch<'a> {
    matched: Vec<&'a str>,
    missing: Vec<&'a str>,
}

impl SectionMatch<'_> {
    fn percent(&self) -> f64 {
        let total = self.matched.len() + self.missing.len();
        if total == 0 {
            0.0
        } else {
            self.matched.len() as f64 / total as f64 * 100.0
        }
    }
}

fn match_terms<'a>(haystack_lower: &str, terms: &'a [String]) -> SectionMatch<'a> {
    let (matched, missing) = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .partition(|t| contains_term(haystack_lower, t));
    SectionMatch { matched, missing }
}

#[async_trait]
impl Rule for BrandAlignmentRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Brand alignment", Dimension::Brand, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.brand;
        let project = &ctx.project;
        let content = &ctx.signals.content;

        let haystack = format!(
            "{} {} {}",
            content.title.as_deref().unwrap_or(""),
            content.meta_description.as_deref().unwrap_or(""),
            ctx.clean_content
        )
        .to_lowercase();

        let section_score = |section: &SectionMatch| -> u8 {
            let fallback = if section.matched.is_empty() {
                config.no_match_score
            } else {
                config.any_match_score
            };
            bucket_score(section.percent(), &config.match_buckets, fallback)
        };

        let attributes = match_terms(&haystack, &project.key_attributes);
        let keywords = match_terms(&haystack, &project.keywords);
        let mut outcome = RuleOutcome::default();
        let mut section_scores = Vec::new();

        for (label, section) in [("Key attributes", &attributes), ("Keywords", &keywords)] {
            if section.matched.is_empty() && section.missing.is_empty() {
                continue;
            }
            let score = section_score(section);
            section_scores.push(score);
            outcome = outcome.evidence(format!(
                "{label}: {} of {} mentioned ({:.0}%)",
                section.matched.len(),
                section.matched.len() + section.missing.len(),
                section.percent()
            ));
            if !section.missing.is_empty() {
                outcome = outcome.maybe_issue(ctx.issue_for(
                    score,
                    format!("{label} not mentioned: {}", section.missing.join(", ")),
                    format!("Work the missing {} into the copy where relevant", label.to_lowercase()),
                ));
            }
        }

        let brand_mentioned = project
            .brand_name
            .as_deref()
            .map(|brand| contains_term(&haystack, brand));
        let competitors = match_terms(&haystack, &project.competitors);
        if !competitors.matched.is_empty() && brand_mentioned == Some(false) {
            outcome = outcome.issue(Issue::new(
                Severity::High,
                format!("Competitors mentioned without the brand: {}", competitors.matched.join(", ")),
                "Mention your own brand wherever competitors are discussed",
            ));
        }
        if let Some(mentioned) = brand_mentioned {
            outcome = outcome.evidence(if mentioned { "Brand mentioned" } else { "Brand not mentioned" });
        }

        if section_scores.is_empty() {
            outcome = outcome.evidence("No brand attributes or keywords configured");
            outcome.score = f64::from(config.neutral_score);
        } else {
            outcome.score =
                section_scores.iter().map(|s| f64::from(*s)).sum::<f64>() / section_scores.len() as f64;
        }

        Ok(outcome.details(json!({
            "matched_attributes": attributes.matched,
            "missing_attributes": attributes.missing,
            "matched_keywords": keywords.matched,
            "missing_keywords": keywords.missing,
            "competitors_mentioned": competitors.matched,
            "brand_mentioned": brand_mentioned,
        })))
    }
}
