//! Model-judged E-E-A-T, reconciled against the heuristic signals.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{authority, Applicability, Rule, RuleContext, RuleMeta, RuleOutcome, CONTENT_CATEGORIES};
use crate::domain::{CategoryType, Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::truncate_chars;
use crate::service::llm::{parse_json_response, CallOptions};

pub const RULE_ID: &str = "authority.llm_eeat";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EeatAssessment {
    has_author: bool,
    author_name: Option<String>,
    author_credentials: serde_json::Value,
    experience_signals: serde_json::Value,
    trust_signals: Vec<String>,
}

/// Non-empty string, non-empty array or `true`.
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

pub struct LlmEeatRule;

impl LlmEeatRule {
    fn prompt(ctx: &RuleContext) -> String {
        let content = truncate_chars(&ctx.clean_content, ctx.config.quality.prompt_content_chars);
        format!(
            "You are evaluating a web page for E-E-A-T (experience, expertise, authoritativeness, trust).\n\
             URL: {url}\n\
             Title: {title}\n\
             Bylines detected: {authors}\n\n\
             Content:\n{content}\n\n\
             Respond with JSON only, no prose:\n\
             {{\"hasAuthor\": bool, \"authorName\": string|null, \"authorCredentials\": string|null, \
             \"experienceSignals\": bool, \"trustSignals\": [string]}}",
            url = ctx.url,
            title = ctx.signals.content.title.as_deref().unwrap_or(""),
            authors = ctx.signals.authority.author_names.join(", "),
        )
    }

    /// Fix self-contradicting answers; each correction is reported.
    fn reconcile(assessment: &mut EeatAssessment) -> Vec<String> {
        let mut corrections = Vec::new();
        if truthy(&assessment.author_credentials) && !assessment.has_author {
            assessment.has_author = true;
            corrections.push("Corrected: credentials reported without an author".to_string());
        }
        if !assessment.has_author && assessment.author_name.is_some() {
            assessment.author_name = None;
            corrections.push("Corrected: author name reported without an author".to_string());
        }
        corrections
    }

    fn degraded(ctx: &RuleContext, reason: &str) -> RuleOutcome {
        tracing::warn!("E-E-A-T analysis unavailable for {}: {}", ctx.url, reason);
        let mut outcome = authority::assess(ctx)
            .evidence(format!("AI analysis unavailable ({reason}); heuristic signals used"))
            .issue(Issue::new(
                Severity::Medium,
                "AI analysis unavailable",
                "Re-run the analysis once the model service is reachable",
            ));
        outcome.details["degraded"] = json!(true);
        outcome
    }
}

#[async_trait]
impl Rule for LlmEeatRule {
    fn meta(&self) -> RuleMeta {
        let mut categories = CONTENT_CATEGORIES.to_vec();
        categories.push(CategoryType::About);
        RuleMeta::new(RULE_ID, "AI E-E-A-T assessment", Dimension::Authority, Applicability::pages(&categories))
            .weight(1.5)
            .with_llm()
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let options = CallOptions::analysis(&ctx.config.llm);
        let response = match ctx
            .llm
            .call(ctx.config.llm.analysis_provider, &Self::prompt(ctx), &options)
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Self::degraded(ctx, &e.to_string())),
        };

        let Some(mut assessment) = parse_json_response::<EeatAssessment>(&response.text) else {
            return Ok(Self::degraded(ctx, "unparseable response"));
        };
        let corrections = Self::reconcile(&mut assessment);
        let points = &ctx.config.llm_eeat;

        let has_credentials = truthy(&assessment.author_credentials);
        let has_experience = truthy(&assessment.experience_signals);
        let trust_count = assessment.trust_signals.len().min(points.max_trust_signals);

        let mut score = f64::from(points.base_score);
        let mut outcome = RuleOutcome::default();
        if assessment.has_author {
            score += f64::from(points.author_points);
            let name = assessment.author_name.as_deref().unwrap_or("unnamed");
            outcome = outcome.evidence(format!("Author identified: {name}"));
        } else {
            outcome = outcome.issue(Issue::new(
                Severity::High,
                "No identifiable author",
                "Attribute the content to a named person with a short bio",
            ));
        }
        if has_credentials {
            score += f64::from(points.credential_points);
            outcome = outcome.evidence("Author credentials stated");
        } else if assessment.has_author {
            outcome = outcome.issue(Issue::new(
                Severity::Medium,
                "Author expertise is not demonstrated",
                "Describe the author's credentials or hands-on experience",
            ));
        }
        if has_experience {
            score += f64::from(points.experience_points);
            outcome = outcome.evidence("First-hand experience signals present");
        }
        score += f64::from(points.trust_signal_points) * trust_count as f64;
        for signal in assessment.trust_signals.iter().take(points.max_trust_signals) {
            outcome = outcome.evidence(format!("Trust signal: {signal}"));
        }
        for correction in &corrections {
            outcome = outcome.evidence(correction.clone());
        }

        outcome.score = score;
        Ok(outcome.details(json!({
            "has_author": assessment.has_author,
            "author_name": assessment.author_name,
            "author_credentials": assessment.author_credentials,
            "experience_signals": has_experience,
            "trust_signals": assessment.trust_signals,
            "corrections": corrections,
        })))
    }
}
