//! Score entities - rule results, rollups and the records handed to the caller

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::{CategoryType, PageCategory};

// ====== Enums ======

/// One scoring axis. Doubles as the fixed set of top-level score categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Authority,
    Freshness,
    Structure,
    Snippet,
    Brand,
    Technical,
    Quality,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Authority,
        Dimension::Freshness,
        Dimension::Structure,
        Dimension::Snippet,
        Dimension::Brand,
        Dimension::Technical,
        Dimension::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Authority => "authority",
            Dimension::Freshness => "freshness",
            Dimension::Structure => "structure",
            Dimension::Snippet => "snippet",
            Dimension::Brand => "brand",
            Dimension::Technical => "technical",
            Dimension::Quality => "quality",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, most severe first so that sorting ascending puts critical issues on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

// ====== Issues ======

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            description: description.into(),
            recommendation: recommendation.into(),
            rule_id: None,
        }
    }

    pub fn with_rule(mut self, rule_id: &str) -> Self {
        self.rule_id = Some(rule_id.to_string());
        self
    }
}

// ====== Rule results ======

pub const MAX_SCORE: u8 = 100;

/// Output of one rule evaluation, normalized by the rule runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub dimension: Dimension,
    pub score: u8,
    pub max_score: u8,
    pub weight: f64,
    pub contribution: f64,
    pub passed: bool,
    pub evidence: Vec<String>,
    pub details: serde_json::Value,
    pub issues: Vec<Issue>,
}

impl RuleResult {
    /// Build a result, clamping the score and keeping the contribution finite.
    pub fn new(
        rule_id: impl Into<String>,
        dimension: Dimension,
        raw_score: f64,
        weight: f64,
        pass_threshold: u8,
    ) -> Self {
        let score = clamp_score(raw_score);
        let weight = if weight.is_finite() && weight > 0.0 { weight } else { 0.0 };
        Self {
            rule_id: rule_id.into(),
            dimension,
            score,
            max_score: MAX_SCORE,
            weight,
            contribution: contribution(score, MAX_SCORE, weight),
            passed: score >= pass_threshold,
            evidence: Vec::new(),
            details: serde_json::Value::Null,
            issues: Vec::new(),
        }
    }
}

/// score/max x weight, zero for degenerate inputs.
pub fn contribution(score: u8, max_score: u8, weight: f64) -> f64 {
    if max_score == 0 || !weight.is_finite() {
        return 0.0;
    }
    let value = f64::from(score) / f64::from(max_score) * weight;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Round and clamp any raw score into 0..=100. NaN maps to 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

// ====== Calculation breadcrumbs ======

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCalculation {
    pub rule_id: String,
    pub score: u8,
    pub max_score: u8,
    pub weight: f64,
    pub contribution: f64,
    pub evidence: Vec<String>,
}

/// Everything needed to reproduce a dimension score from stored data alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationDetails {
    pub dimension: Dimension,
    pub formula: String,
    pub total_weight: f64,
    pub total_contribution: f64,
    pub final_score: u8,
    pub band: ScoreBand,
    pub rules: Vec<RuleCalculation>,
}

impl CalculationDetails {
    /// Recompute the final score from the per-rule breadcrumbs.
    pub fn recompute(&self) -> u8 {
        let total_weight: f64 = self.rules.iter().map(|r| r.weight).sum();
        if total_weight <= 0.0 {
            return 0;
        }
        let total: f64 = self
            .rules
            .iter()
            .map(|r| contribution(r.score, r.max_score, r.weight))
            .sum();
        clamp_score(total / total_weight * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl ScoreBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ScoreBand::Excellent,
            60..=79 => ScoreBand::Good,
            35..=59 => ScoreBand::NeedsImprovement,
            _ => ScoreBand::Poor,
        }
    }
}

// ====== Rollups ======

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub dimension: Dimension,
    pub score: u8,
    pub rule_results: Vec<RuleResult>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub applied_rules: usize,
    pub passed_rules: usize,
    pub calculation_details: CalculationDetails,
}

impl CategoryScore {
    /// A dimension with no applicable rules: zero score, zero applied rules.
    pub fn empty(dimension: Dimension) -> Self {
        Self {
            dimension,
            score: 0,
            rule_results: Vec::new(),
            issues: Vec::new(),
            recommendations: Vec::new(),
            applied_rules: 0,
            passed_rules: 0,
            calculation_details: CalculationDetails {
                dimension,
                formula: String::from("no applicable rules"),
                total_weight: 0.0,
                total_contribution: 0.0,
                final_score: 0,
                band: ScoreBand::Poor,
                rules: Vec::new(),
            },
        }
    }
}

/// Page-level score record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageScore {
    pub url: String,
    pub page_type: CategoryType,
    pub page_category: PageCategory,
    pub timestamp: DateTime<Utc>,
    pub category_scores: BTreeMap<Dimension, CategoryScore>,
    pub global_score: u8,
    pub total_issues: usize,
    pub critical_issues: usize,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl PageScore {
    pub fn category(&self, dimension: Dimension) -> Option<&CategoryScore> {
        self.category_scores.get(&dimension)
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

// ====== Domain analysis ======

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysisMetadata {
    pub page_count: usize,
    pub pages_analyzed: usize,
    pub pages_failed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub llm_calls: usize,
    #[serde(default)]
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysisResult {
    pub id: String,
    pub domain: String,
    pub project_id: String,
    pub overall_score: u8,
    pub dimension_scores: BTreeMap<Dimension, u8>,
    pub rule_results: Vec<RuleResult>,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
    pub calculation_details: Vec<CalculationDetails>,
    pub metadata: DomainAnalysisMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_result_clamps_out_of_range_scores() {
        let high = RuleResult::new("r", Dimension::Structure, 130.0, 1.0, 60);
        assert_eq!(high.score, 100);
        assert!(high.passed);

        let low = RuleResult::new("r", Dimension::Structure, -5.0, 1.0, 60);
        assert_eq!(low.score, 0);
        assert!(!low.passed);

        let nan = RuleResult::new("r", Dimension::Structure, f64::NAN, f64::NAN, 60);
        assert_eq!(nan.score, 0);
        assert_eq!(nan.weight, 0.0);
        assert!(nan.contribution.is_finite());
    }

    #[test]
    fn contribution_is_weighted_share() {
        let result = RuleResult::new("r", Dimension::Authority, 80.0, 0.5, 60);
        assert!((result.contribution - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn severity_orders_critical_first() {
        let mut severities = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        );
    }

    #[test]
    fn score_bands() {
        assert_eq!(ScoreBand::for_score(95), ScoreBand::Excellent);
        assert_eq!(ScoreBand::for_score(60), ScoreBand::Good);
        assert_eq!(ScoreBand::for_score(35), ScoreBand::NeedsImprovement);
        assert_eq!(ScoreBand::for_score(10), ScoreBand::Poor);
    }
}
