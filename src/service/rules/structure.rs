use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::validate_heading_hierarchy;

pub const RULE_ID: &str = "structure.semantic_structure";

pub struct SemanticStructureRule;

#[async_trait]
impl Rule for SemanticStructureRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Semantic structure", Dimension::Structure, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.structure;
        let structure = &ctx.signals.structure;
        let content = &ctx.signals.content;
        let mut score = u32::from(config.base_score);
        let mut outcome = RuleOutcome::default();

        match structure.h1_count {
            1 => {
                score += u32::from(config.single_h1_points);
                outcome = outcome.evidence("Exactly one H1");
            }
            0 => {
                outcome = outcome.issue(Issue::new(
                    Severity::High,
                    "Page has no H1 heading",
                    "Add a single H1 that states the page topic",
                ));
            }
            n => {
                score += u32::from(config.multiple_h1_points);
                outcome = outcome.evidence(format!("{n} H1 headings")).issue(Issue::new(
                    Severity::Medium,
                    format!("Page has {n} H1 headings"),
                    "Keep one H1 and demote the others to H2",
                ));
            }
        }

        let levels = ctx.signals.heading_levels();
        let hierarchy = validate_heading_hierarchy(&levels);
        if levels.is_empty() {
            score += u32::from(config.broken_hierarchy_points);
            outcome = outcome.evidence("No headings to validate");
        } else if hierarchy.valid {
            score += u32::from(config.valid_hierarchy_points);
            outcome = outcome.evidence(format!("Heading hierarchy valid across {} headings", levels.len()));
        } else {
            score += u32::from(config.broken_hierarchy_points);
            for violation in &hierarchy.violations {
                outcome = outcome.evidence(format!(
                    "H{} follows H{} at heading #{}",
                    violation.level,
                    violation.parent_level,
                    violation.index + 1
                ));
            }
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Heading levels are skipped",
                "Nest headings one level at a time (H2 under H1, H3 under H2)",
            ));
        }

        let relevant: Vec<&String> = structure
            .schema_types
            .iter()
            .filter(|t| config.relevant_schema_types.iter().any(|r| r.eq_ignore_ascii_case(t)))
            .collect();
        if relevant.is_empty() {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "No relevant structured data found",
                "Add JSON-LD markup (Article, FAQPage, Product, ...) describing the page",
            ));
        } else {
            score += u32::from(config.schema_points);
            outcome = outcome.evidence(format!(
                "Schema types: {}",
                relevant.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ));
            if structure.schema_has_article_fields {
                score += u32::from(config.schema_fields_bonus);
                outcome = outcome.evidence("Schema carries article fields");
            }
        }

        let readability = if content.sentence_count == 0 {
            config.readability_floor
        } else {
            config
                .readability_buckets
                .iter()
                .find(|bucket| content.avg_sentence_length <= bucket.max_words)
                .map(|bucket| bucket.points)
                .unwrap_or(config.readability_floor)
        };
        score += u32::from(readability);
        outcome = outcome.evidence(format!(
            "Average sentence length {:.1} words",
            content.avg_sentence_length
        ));
        if readability == config.readability_floor && content.sentence_count > 0 {
            outcome = outcome.issue(Issue::new(
                Severity::Low,
                "Sentences are long and hard to scan",
                "Break long sentences up; aim for under 20 words on average",
            ));
        }

        outcome.score = f64::from(score.min(100));
        Ok(outcome.details(json!({
            "h1_count": structure.h1_count,
            "heading_levels": levels,
            "hierarchy": hierarchy,
            "relevant_schema_types": relevant,
            "readability_points": readability,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context_for, html};

    #[tokio::test]
    async fn well_structured_article_hits_cap() {
        let ctx = context_for("https://example.com/blog/post", html::BLOG_POST);
        let outcome = SemanticStructureRule.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.details["hierarchy"]["valid"], true);
    }

    #[tokio::test]
    async fn skipped_level_and_no_schema() {
        let doc = "<html><body><h1>Guide</h1><h3>Detail</h3><p>Short sentence here. Another one.</p></body></html>";
        let ctx = context_for("https://example.com/guide", doc);
        let outcome = SemanticStructureRule.evaluate(&ctx).await.unwrap();
        // base 20 + h1 20 + broken 10 + schema 0 + readability 20
        assert_eq!(outcome.score, 70.0);
        assert!(outcome.evidence.iter().any(|e| e == "H3 follows H1 at heading #2"));
    }

    #[tokio::test]
    async fn empty_page_scores_base_absent_hierarchy_and_floor() {
        let ctx = context_for("https://example.com/", "<html><body></body></html>");
        let outcome = SemanticStructureRule.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.score, 35.0);
    }

    #[tokio::test]
    async fn multiple_h1_get_partial_credit() {
        let doc = "<html><body><h1>A</h1><h1>B</h1></body></html>";
        let ctx = context_for("https://example.com/", doc);
        let outcome = SemanticStructureRule.evaluate(&ctx).await.unwrap();
        // base 20 + h1 10 + valid 20 + readability 20 ("A B" is one short sentence)
        assert_eq!(outcome.score, 70.0);
    }
}
