//! Shared deterministic types for validation reports.
//!
//! Issues are recorded in the order checks run so serialized reports stay
//! stable across invocations with the same inputs.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identifier used for issues that are not attributable to a single entity.
pub const SENTINEL_ID: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Invalidates the owning report.
    Error,
    /// Recorded only; the gate may opt in to failing on these.
    Warning,
}

/// Kind of entity an issue is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueScope {
    Experiment,
    Condition,
    Task,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub scope: IssueScope,
    pub id: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(scope: IssueScope, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            scope,
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn warning(scope: IssueScope, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            scope,
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Answers whether a referenced file exists.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Count `(errors, warnings)` in an issue list.
pub fn count_issues(issues: &[ValidationIssue]) -> (usize, usize) {
    let errors = issues.iter().filter(|issue| issue.is_error()).count();
    (errors, issues.len() - errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serializes_with_lowercase_tags() {
        let issue = ValidationIssue::warning(IssueScope::Experiment, SENTINEL_ID, "low coverage");
        let json = serde_json::to_string(&issue).expect("serialize");
        assert_eq!(
            json,
            r#"{"severity":"warning","scope":"experiment","id":"*","message":"low coverage"}"#
        );
    }

    #[test]
    fn counts_errors_and_warnings() {
        let issues = vec![
            ValidationIssue::error(IssueScope::Run, "r1", "a"),
            ValidationIssue::warning(IssueScope::Run, "r2", "b"),
            ValidationIssue::error(IssueScope::Task, "t1", "c"),
        ];
        assert_eq!(count_issues(&issues), (2, 1));
    }
}
