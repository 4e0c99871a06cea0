use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome, CONTENT_CATEGORIES};
use crate::domain::{CategoryType, Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::truncate_chars;
use crate::service::aggregator::bucket_score;
use crate::service::llm::{parse_json_response, CallOptions};

pub const DEPTH_RULE_ID: &str = "quality.content_depth";
pub const LLM_QUALITY_RULE_ID: &str = "quality.llm_content_quality";

const MAX_MODEL_ISSUES: usize = 5;

pub struct ContentDepthRule;

fn depth_outcome(ctx: &RuleContext) -> RuleOutcome {
    let config = &ctx.config.quality;
    let words = ctx.signals.content.word_count;
    let score = bucket_score(words as f64, &config.depth_buckets, config.depth_floor);
    RuleOutcome::new(score)
        .evidence(format!("{words} words of main content"))
        .maybe_issue(ctx.issue_for(
            score,
            format!("Thin content ({words} words)"),
            "Expand the page with specific, substantive information",
        ))
        .details(json!({ "word_count": words }))
}

#[async_trait]
impl Rule for ContentDepthRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(DEPTH_RULE_ID, "Content depth", Dimension::Quality, Applicability::all_pages())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        Ok(depth_outcome(ctx))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QualityAssessment {
    clarity: f64,
    depth: f64,
    answers_questions: bool,
    issues: Vec<String>,
}

pub struct LlmContentQualityRule;

impl LlmContentQualityRule {
    fn prompt(ctx: &RuleContext) -> String {
        let content = truncate_chars(&ctx.clean_content, ctx.config.quality.prompt_content_chars);
        format!(
            "Rate the content quality of this web page for answer engines.\n\
             URL: {url}\n\
             Title: {title}\n\
             Question headings: {questions}\n\n\
             Content:\n{content}\n\n\
             Respond with JSON only:\n\
             {{\"clarity\": 0-100, \"depth\": 0-100, \"answersQuestions\": bool, \"issues\": [string]}}",
            url = ctx.url,
            title = ctx.signals.content.title.as_deref().unwrap_or(""),
            questions = ctx.signals.structure.question_headings.join(" | "),
        )
    }
}

#[async_trait]
impl Rule for LlmContentQualityRule {
    fn meta(&self) -> RuleMeta {
        let mut categories = CONTENT_CATEGORIES.to_vec();
        categories.extend([CategoryType::LandingCampaign, CategoryType::Unknown]);
        RuleMeta::new(
            LLM_QUALITY_RULE_ID,
            "AI content quality",
            Dimension::Quality,
            Applicability::pages(&categories),
        )
        .weight(1.5)
        .with_llm()
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let options = CallOptions::analysis(&ctx.config.llm);
        let assessment = match ctx
            .llm
            .call(ctx.config.llm.analysis_provider, &Self::prompt(ctx), &options)
            .await
        {
            Ok(response) => parse_json_response::<QualityAssessment>(&response.text)
                .ok_or_else(|| "unparseable response".to_string()),
            Err(e) => Err(e.to_string()),
        };

        let assessment = match assessment {
            Ok(assessment) => assessment,
            Err(reason) => {
                tracing::warn!("Content quality analysis unavailable for {}: {}", ctx.url, reason);
                return Ok(depth_outcome(ctx)
                    .evidence(format!("AI analysis unavailable ({reason}); depth heuristic used"))
                    .issue(Issue::new(
                        Severity::Medium,
                        "AI analysis unavailable",
                        "Re-run the analysis once the model service is reachable",
                    )));
            }
        };

        let clarity = assessment.clarity.clamp(0.0, 100.0);
        let depth = assessment.depth.clamp(0.0, 100.0);
        let mut score = (clarity + depth) / 2.0;
        if assessment.answers_questions {
            score += f64::from(ctx.config.quality.answers_questions_bonus);
        }

        let mut outcome = RuleOutcome::new(score.min(100.0))
            .evidence(format!("Clarity {clarity:.0}, depth {depth:.0}"));
        if assessment.answers_questions {
            outcome = outcome.evidence("Content answers the questions it raises");
        }
        for problem in assessment.issues.iter().filter(|p| !p.trim().is_empty()).take(MAX_MODEL_ISSUES) {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                problem.trim(),
                "Revise the content to address this point",
            ));
        }

        Ok(outcome.details(json!({
            "clarity": clarity,
            "depth": depth,
            "answers_questions": assessment.answers_questions,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context_for, context_with_llm, ScriptedLlm};
    use std::sync::Arc;

    fn page_with_words(n: usize) -> String {
        format!("<html><body><main><p>{}</p></main></body></html>", "word ".repeat(n))
    }

    #[tokio::test]
    async fn depth_buckets() {
        for (words, expected) in [(1600, 100.0), (900, 80.0), (300, 60.0), (150, 40.0), (20, 20.0)] {
            let ctx = context_for("https://example.com/a", &page_with_words(words));
            assert_eq!(ContentDepthRule.evaluate(&ctx).await.unwrap().score, expected, "{words} words");
        }
    }

    #[tokio::test]
    async fn model_scores_are_averaged_with_bonus() {
        let llm = Arc::new(ScriptedLlm::new().respond(
            "content quality",
            r#"{"clarity": 80, "depth": 60, "answersQuestions": true, "issues": ["Lacks examples", " "]}"#,
        ));
        let ctx = context_with_llm("https://example.com/a", &page_with_words(500), llm);
        let outcome = LlmContentQualityRule.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.score, 80.0);
        assert_eq!(outcome.issues.len(), 1);
    }

    #[tokio::test]
    async fn bonus_is_capped() {
        let llm = Arc::new(ScriptedLlm::new().respond(
            "content quality",
            r#"{"clarity": 100, "depth": 98, "answersQuestions": true}"#,
        ));
        let ctx = context_with_llm("https://example.com/a", &page_with_words(500), llm);
        assert_eq!(LlmContentQualityRule.evaluate(&ctx).await.unwrap().score, 100.0);
    }

    #[tokio::test]
    async fn failure_falls_back_to_depth() {
        let llm = Arc::new(ScriptedLlm::new().fail_all());
        let ctx = context_with_llm("https://example.com/a", &page_with_words(900), llm);
        let outcome = LlmContentQualityRule.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.score, 80.0);
        assert!(outcome.issues.iter().any(|i| i.description == "AI analysis unavailable"));
    }
}
