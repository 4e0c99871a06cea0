//! Weighted aggregation of rule results into one dimension score.

use std::collections::HashSet;

use crate::config::ThresholdBucket;
use crate::domain::{clamp_score, CalculationDetails, Dimension, Issue, RuleCalculation, RuleResult, ScoreBand};

pub const FORMULA: &str = "round(sum(score / max_score * weight) / sum(weight) * 100)";

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub final_score: u8,
    pub calculation_details: CalculationDetails,
    pub rule_results: Vec<RuleResult>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalAggregator;

impl ConditionalAggregator {
    pub fn aggregate(dimension: Dimension, results: &[RuleResult]) -> Aggregation {
        let total_weight: f64 = results.iter().map(|r| r.weight).sum();
        let total_contribution: f64 = results.iter().map(|r| r.contribution).sum();

        let final_score = if total_weight > 0.0 {
            clamp_score(total_contribution / total_weight * 100.0)
        } else {
            0
        };

        let rules = results
            .iter()
            .map(|r| RuleCalculation {
                rule_id: r.rule_id.clone(),
                score: r.score,
                max_score: r.max_score,
                weight: r.weight,
                contribution: r.contribution,
                evidence: r.evidence.clone(),
            })
            .collect();

        let mut seen = HashSet::new();
        let issues = results
            .iter()
            .flat_map(|r| r.issues.iter())
            .filter(|issue| seen.insert(issue.description.clone()))
            .cloned()
            .collect();

        Aggregation {
            final_score,
            calculation_details: CalculationDetails {
                dimension,
                formula: FORMULA.to_string(),
                total_weight,
                total_contribution,
                final_score,
                band: ScoreBand::for_score(final_score),
                rules,
            },
            rule_results: results.to_vec(),
            issues,
        }
    }
}

/// Score of the first bucket whose `min` the value reaches, else `fallback`.
pub fn bucket_score(value: f64, buckets: &[ThresholdBucket], fallback: u8) -> u8 {
    buckets
        .iter()
        .find(|bucket| value >= bucket.min)
        .map(|bucket| bucket.score)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn result(id: &str, score: f64, weight: f64) -> RuleResult {
        RuleResult::new(id, Dimension::Structure, score, weight, 60)
    }

    #[test]
    fn weighted_average_of_contributions() {
        let results = vec![result("a", 80.0, 1.0), result("b", 50.0, 2.0)];
        let agg = ConditionalAggregator::aggregate(Dimension::Structure, &results);
        // (0.8 + 1.0) / 3 * 100 = 60
        assert_eq!(agg.final_score, 60);
        assert_eq!(agg.calculation_details.band, ScoreBand::Good);
        assert_eq!(agg.calculation_details.rules.len(), 2);
    }

    #[test]
    fn zero_weight_yields_zero() {
        let agg = ConditionalAggregator::aggregate(Dimension::Brand, &[result("a", 90.0, 0.0)]);
        assert_eq!(agg.final_score, 0);
        assert_eq!(ConditionalAggregator::aggregate(Dimension::Brand, &[]).final_score, 0);
    }

    #[test]
    fn details_recompute_to_the_same_score() {
        let results = vec![result("a", 73.0, 1.3), result("b", 41.0, 0.7), result("c", 100.0, 2.0)];
        let agg = ConditionalAggregator::aggregate(Dimension::Quality, &results);
        assert_eq!(agg.calculation_details.recompute(), agg.final_score);

        let json = serde_json::to_string(&agg.calculation_details).unwrap();
        let back: CalculationDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(back.recompute(), agg.final_score);
    }

    #[test]
    fn duplicate_issue_descriptions_are_dropped() {
        let mut a = result("a", 20.0, 1.0);
        a.issues.push(Issue::new(Severity::High, "Missing H1", "Add one H1"));
        let mut b = result("b", 20.0, 1.0);
        b.issues.push(Issue::new(Severity::Medium, "Missing H1", "Add one H1"));
        let agg = ConditionalAggregator::aggregate(Dimension::Structure, &[a, b]);
        assert_eq!(agg.issues.len(), 1);
        assert_eq!(agg.issues[0].severity, Severity::High);
    }

    #[test]
    fn buckets_pick_first_reached_threshold() {
        let buckets = [
            ThresholdBucket { min: 80.0, score: 100 },
            ThresholdBucket { min: 50.0, score: 75 },
        ];
        assert_eq!(bucket_score(90.0, &buckets, 10), 100);
        assert_eq!(bucket_score(50.0, &buckets, 10), 75);
        assert_eq!(bucket_score(49.9, &buckets, 10), 10);
    }
}
