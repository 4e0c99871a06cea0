use async_trait::async_trait;
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome};
use crate::domain::Dimension;
use crate::error::RuleError;
use crate::service::aggregator::bucket_score;

pub const RULE_ID: &str = "technical.schema_coverage";

pub struct SchemaCoverageRule;

#[async_trait]
impl Rule for SchemaCoverageRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Structured data coverage", Dimension::Technical, Applicability::domain())
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.domain_authority;
        let relevant = &ctx.config.structure.relevant_schema_types;
        let pages = ctx.domain_pages.as_slice();

        let covered = pages
            .iter()
            .filter(|signals| {
                signals
                    .structure
                    .schema_types
                    .iter()
                    .any(|t| relevant.iter().any(|r| r.eq_ignore_ascii_case(t)))
            })
            .count();
        let coverage = if pages.is_empty() {
            0.0
        } else {
            covered as f64 / pages.len() as f64 * 100.0
        };

        let fallback = if covered > 0 {
            config.coverage_any_score
        } else {
            config.coverage_none_score
        };
        let score = bucket_score(coverage, &config.coverage_buckets, fallback);

        Ok(RuleOutcome::new(score)
            .evidence(format!("{covered} of {} pages carry relevant schema markup", pages.len()))
            .maybe_issue(ctx.issue_for(
                score,
                format!("Only {coverage:.0}% of pages carry structured data"),
                "Add JSON-LD markup to every content template",
            ))
            .details(json!({
                "pages": pages.len(),
                "covered": covered,
                "coverage_percent": coverage,
            })))
    }
}
