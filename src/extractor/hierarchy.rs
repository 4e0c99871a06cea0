//! Heading hierarchy validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyViolation {
    /// Position of the offending heading in document order.
    pub index: usize,
    pub parent_level: u8,
    pub level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyReport {
    pub valid: bool,
    pub violations: Vec<HierarchyViolation>,
}

/// Check that no heading goes more than one level below its nearest open ancestor.
///
/// Levels are tracked on a stack so that returning to a shallower level closes
/// the deeper sections: `H1 H2 H3 H2 H3` is valid, `H1 H3` is not.
pub fn validate_heading_hierarchy(levels: &[u8]) -> HierarchyReport {
    let mut stack: Vec<u8> = Vec::new();
    let mut violations = Vec::new();

    for (index, &level) in levels.iter().enumerate() {
        while stack.last().is_some_and(|&top| top >= level) {
            stack.pop();
        }
        if let Some(&parent_level) = stack.last() {
            if level > parent_level + 1 {
                violations.push(HierarchyViolation {
                    index,
                    parent_level,
                    level,
                });
            }
        }
        stack.push(level);
    }

    HierarchyReport {
        valid: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtracking_to_sibling_is_valid() {
        assert!(validate_heading_hierarchy(&[1, 2, 3, 2, 3]).valid);
    }

    #[test]
    fn skipping_a_level_is_invalid() {
        let report = validate_heading_hierarchy(&[1, 3]);
        assert!(!report.valid);
        assert_eq!(
            report.violations,
            vec![HierarchyViolation { index: 1, parent_level: 1, level: 3 }]
        );
    }

    #[test]
    fn sibling_reset_is_not_a_violation() {
        assert!(validate_heading_hierarchy(&[1, 2, 1, 2]).valid);
    }

    #[test]
    fn skip_after_backtrack_is_caught() {
        let report = validate_heading_hierarchy(&[1, 2, 3, 2, 4]);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].index, 4);
        assert_eq!(report.violations[0].parent_level, 2);
    }

    #[test]
    fn first_heading_has_no_parent() {
        assert!(validate_heading_hierarchy(&[2, 3, 3]).valid);
        assert!(validate_heading_hierarchy(&[]).valid);
    }
}
