use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;

pub const RULE_ID: &str = "snippet.extractability";

const QA_SCHEMA_TYPES: &[&str] = &["FAQPage", "QAPage"];

pub struct ExtractabilityRule;

#[async_trait]
impl Rule for ExtractabilityRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Snippet extractability", Dimension::Snippet, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.snippet;
        let structure = &ctx.signals.structure;
        let paragraphs = &ctx.signals.content.paragraph_word_counts;
        let mut score = i32::from(config.base_score);
        let mut outcome = RuleOutcome::default();

        if structure.list_count > 0 {
            score += i32::from(config.list_points);
            outcome = outcome.evidence(format!(
                "{} lists with {} items",
                structure.list_count, structure.list_item_count
            ));
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Low,
                "No lists on the page",
                "Present steps, options or key facts as bulleted or numbered lists",
            ));
        }

        let qa_schema = structure
            .schema_types
            .iter()
            .any(|t| QA_SCHEMA_TYPES.iter().any(|qa| qa.eq_ignore_ascii_case(t)));
        if !structure.question_headings.is_empty() || qa_schema {
            score += i32::from(config.qa_points);
            outcome = outcome.evidence(format!(
                "{} question headings{}",
                structure.question_headings.len(),
                if qa_schema { ", Q&A schema" } else { "" }
            ));
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "No question-and-answer blocks",
                "Phrase key headings as the questions users ask and answer them directly below",
            ));
        }

        let short = paragraphs
            .iter()
            .filter(|&&words| words <= config.short_paragraph_max_words)
            .count();
        let short_share = if paragraphs.is_empty() {
            0.0
        } else {
            short as f64 / paragraphs.len() as f64
        };
        if !paragraphs.is_empty() && short_share >= config.short_share_full {
            score += i32::from(config.short_paragraph_points);
        } else if !paragraphs.is_empty() && short_share >= config.short_share_partial {
            score += i32::from(config.short_paragraph_partial_points);
        }
        outcome = outcome.evidence(format!("{short} of {} paragraphs are short", paragraphs.len()));

        if structure.table_count > 0 {
            score += i32::from(config.table_points);
            outcome = outcome.evidence(format!("{} tables", structure.table_count));
        }

        let long = paragraphs
            .iter()
            .filter(|&&words| words > config.long_paragraph_min_words)
            .count();
        let breaks = structure.headings.len() + structure.list_count + structure.table_count;
        let wall_of_text = long >= config.wall_of_text_min_long_paragraphs && breaks < long;
        if wall_of_text {
            score -= i32::from(config.wall_of_text_penalty);
            outcome = outcome.evidence(format!("{long} long paragraphs with only {breaks} structural breaks")).issue(
                Issue::new(
                    Severity::High,
                    "Wall of text",
                    "Split long paragraphs and add subheadings, lists or tables",
                ),
            );
        }

        outcome.score = f64::from(score.clamp(0, 100));
        Ok(outcome.details(json!({
            "short_paragraph_share": short_share,
            "long_paragraphs": long,
            "structural_breaks": breaks,
            "wall_of_text": wall_of_text,
        })))
    }
}
