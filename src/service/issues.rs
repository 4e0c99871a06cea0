//! Severity mapping and issue/recommendation deduplication.

use std::collections::HashSet;

use crate::config::SeverityThresholds;
use crate::domain::{Issue, Severity};

/// Severity of a low score; `None` once the score clears the `medium` cut point.
pub fn severity_for_score(score: u8, thresholds: &SeverityThresholds) -> Option<Severity> {
    if score < thresholds.critical {
        Some(Severity::Critical)
    } else if score < thresholds.high {
        Some(Severity::High)
    } else if score < thresholds.medium {
        Some(Severity::Medium)
    } else {
        None
    }
}

/// An issue whose severity follows the score, or nothing for a good score.
pub fn issue_for_score(
    score: u8,
    thresholds: &SeverityThresholds,
    description: impl Into<String>,
    recommendation: impl Into<String>,
) -> Option<Issue> {
    severity_for_score(score, thresholds).map(|severity| Issue::new(severity, description, recommendation))
}

/// Pools issues from many rules: first occurrence of a description wins.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
    seen: HashSet<String>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        if self.seen.insert(issue.description.clone()) {
            self.issues.push(issue);
        }
    }

    pub fn extend<I: IntoIterator<Item = Issue>>(&mut self, issues: I) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues ordered critical first; equal severities keep insertion order.
    pub fn into_sorted(mut self) -> Vec<Issue> {
        self.issues.sort_by_key(|issue| issue.severity);
        self.issues
    }
}

/// Unique, non-empty recommendations in issue order.
pub fn unique_recommendations(issues: &[Issue]) -> Vec<String> {
    let mut seen = HashSet::new();
    issues
        .iter()
        .map(|issue| issue.recommendation.trim())
        .filter(|rec| !rec.is_empty() && seen.insert(rec.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping_uses_default_cut_points() {
        let t = SeverityThresholds::default();
        assert_eq!(severity_for_score(10, &t), Some(Severity::Critical));
        assert_eq!(severity_for_score(50, &t), Some(Severity::High));
        assert_eq!(severity_for_score(75, &t), Some(Severity::Medium));
        assert_eq!(severity_for_score(90, &t), None);
        assert_eq!(severity_for_score(35, &t), Some(Severity::High));
        assert_eq!(severity_for_score(80, &t), None);
    }

    #[test]
    fn issue_for_good_score_is_none() {
        let t = SeverityThresholds::default();
        assert!(issue_for_score(95, &t, "x", "y").is_none());
        let issue = issue_for_score(20, &t, "Thin content", "Add detail").unwrap();
        assert_eq!(issue.severity, Severity::Critical);
    }

    #[test]
    fn collector_dedups_and_sorts_stably() {
        let mut collector = IssueCollector::new();
        collector.push(Issue::new(Severity::Low, "a", "fix a"));
        collector.push(Issue::new(Severity::Critical, "b", "fix b"));
        collector.push(Issue::new(Severity::Low, "c", "fix a"));
        collector.push(Issue::new(Severity::High, "a", "duplicate"));
        assert_eq!(collector.len(), 3);

        let sorted = collector.into_sorted();
        let descriptions: Vec<&str> = sorted.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["b", "a", "c"]);
        assert_eq!(unique_recommendations(&sorted), vec!["fix b", "fix a"]);
    }
}
