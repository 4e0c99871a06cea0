use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use super::{Applicability, Rule, RuleContext, RuleMeta, RuleOutcome, CONTENT_CATEGORIES};
use crate::domain::{Dimension, Issue, Severity};
use crate::error::RuleError;
use crate::extractor::dates::parse_date;

pub const RULE_ID: &str = "freshness.content_age";

pub struct ContentAgeRule;

impl ContentAgeRule {
    /// Newest date that is not implausibly far in the future.
    fn newest_plausible(ctx: &RuleContext) -> Option<DateTime<Utc>> {
        let freshness = &ctx.signals.freshness;
        let latest_allowed = ctx.now + Duration::days(ctx.config.freshness.max_future_skew_days);
        freshness
            .published
            .iter()
            .chain(freshness.modified.iter())
            .chain(freshness.raw_signals.iter())
            .filter_map(|raw| parse_date(raw))
            .filter(|date| *date <= latest_allowed)
            .max()
    }
}

#[async_trait]
impl Rule for ContentAgeRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta::new(RULE_ID, "Content age", Dimension::Freshness, Applicability::pages(CONTENT_CATEGORIES))
    }

    async fn evaluate(&self, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        let config = &ctx.config.freshness;

        let Some(newest) = Self::newest_plausible(ctx) else {
            return Ok(RuleOutcome::new(config.missing_score)
                .evidence("No publication or modification date found")
                .issue(Issue::new(
                    Severity::High,
                    "No publication or modification date found",
                    "Expose datePublished/dateModified in JSON-LD and show the date on the page",
                ))
                .details(json!({ "newest": null })));
        };

        let age_days = (ctx.now - newest).num_days().max(0);
        let score = config
            .age_buckets
            .iter()
            .find(|bucket| age_days <= bucket.max_days)
            .map(|bucket| bucket.score)
            .unwrap_or(config.stale_score);

        Ok(RuleOutcome::new(score)
            .evidence(format!("Newest date {} ({age_days} days old)", newest.to_rfc3339()))
            .maybe_issue(ctx.issue_for(
                score,
                format!("Content was last updated {age_days} days ago"),
                "Review and refresh the content, then update dateModified",
            ))
            .details(json!({
                "newest": newest.to_rfc3339(),
                "age_days": age_days,
            })))
    }
}
