//! Structural checks for an experiment manifest.
//!
//! These never fail: every problem becomes a [`ValidationIssue`]. The only
//! filesystem access (prompt-file existence) goes through [`PathProbe`].

use std::collections::HashSet;
use std::path::Path;

use crate::core::types::{IssueScope, PathProbe, SENTINEL_ID, ValidationIssue};
use crate::experiment::{ExperimentManifest, id_key};

/// Check a manifest and return issues in a deterministic order:
/// experiment-level, conditions, then tasks (each in declaration order).
pub fn check_manifest(
    manifest: &ExperimentManifest,
    base_dir: &Path,
    probe: &dyn PathProbe,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if manifest.experiment_id.trim().is_empty() {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "experiment_id must be non-empty",
        ));
    }
    if manifest.runs_per_cell == 0 {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "runs_per_cell must be > 0",
        ));
    }
    if manifest
        .tool_prefixes
        .iter()
        .all(|prefix| prefix.trim().is_empty())
    {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "tool_prefixes must contain at least one non-empty prefix",
        ));
    }
    if manifest.primary_control().is_none() {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "no control condition (tools_enabled=false) declared",
        ));
    }
    if manifest.primary_treatment().is_none() {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "no treatment condition (tools_enabled=true) declared",
        ));
    }
    if manifest.tasks.is_empty() {
        issues.push(ValidationIssue::error(
            IssueScope::Experiment,
            SENTINEL_ID,
            "at least one task is required",
        ));
    }

    check_conditions(manifest, &mut issues);
    check_tasks(manifest, base_dir, probe, &mut issues);
    issues
}

fn check_conditions(manifest: &ExperimentManifest, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for condition in &manifest.conditions {
        if condition.id.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueScope::Condition,
                SENTINEL_ID,
                "condition id must be non-empty",
            ));
            continue;
        }
        if !seen.insert(id_key(&condition.id)) {
            issues.push(ValidationIssue::error(
                IssueScope::Condition,
                condition.id.clone(),
                format!("duplicate condition id '{}'", condition.id),
            ));
        }
    }
}

fn check_tasks(
    manifest: &ExperimentManifest,
    base_dir: &Path,
    probe: &dyn PathProbe,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut seen = HashSet::new();
    for task in &manifest.tasks {
        if task.id.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueScope::Task,
                SENTINEL_ID,
                "task id must be non-empty",
            ));
            continue;
        }
        let id = task.id.as_str();
        if !seen.insert(id_key(id)) {
            issues.push(ValidationIssue::error(
                IssueScope::Task,
                id,
                format!("duplicate task id '{id}'"),
            ));
        }
        if task.title.trim().is_empty() {
            issues.push(ValidationIssue::warning(
                IssueScope::Task,
                id,
                format!("task '{id}' has no title"),
            ));
        }
        if task.repo.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueScope::Task,
                id,
                format!("task '{id}' is missing repo"),
            ));
        }
        if task.commit.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueScope::Task,
                id,
                format!("task '{id}' is missing commit"),
            ));
        }
        if task
            .acceptance_checks
            .iter()
            .all(|check| check.trim().is_empty())
        {
            issues.push(ValidationIssue::error(
                IssueScope::Task,
                id,
                format!("task '{id}' has no acceptance checks"),
            ));
        }
        if let Some(prompt_file) = &task.prompt_file {
            let resolved = base_dir.join(prompt_file);
            if !probe.exists(&resolved) {
                issues.push(ValidationIssue::error(
                    IssueScope::Task,
                    id,
                    format!(
                        "task '{id}' prompt file not found: {}",
                        resolved.display()
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Severity, count_issues};
    use crate::test_support::{FixedProbe, condition, standard_manifest, task};
    use std::path::PathBuf;

    #[test]
    fn standard_manifest_has_no_issues() {
        let issues = check_manifest(&standard_manifest(), Path::new("."), &FixedProbe::empty());
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn reports_duplicate_ids_case_insensitively() {
        let mut manifest = standard_manifest();
        manifest.conditions.push(condition("CONTROL", false));
        manifest.tasks.push(task("T1"));
        let issues = check_manifest(&manifest, Path::new("."), &FixedProbe::empty());
        assert!(
            issues
                .iter()
                .any(|issue| issue.message.contains("duplicate condition id 'CONTROL'"))
        );
        assert!(
            issues
                .iter()
                .any(|issue| issue.message.contains("duplicate task id 'T1'"))
        );
    }

    #[test]
    fn requires_control_and_treatment() {
        let mut manifest = standard_manifest();
        manifest.conditions.retain(|c| c.tools_enabled);
        let issues = check_manifest(&manifest, Path::new("."), &FixedProbe::empty());
        assert!(
            issues
                .iter()
                .any(|issue| issue.is_error() && issue.message.contains("no control condition"))
        );
        assert!(
            !issues
                .iter()
                .any(|issue| issue.message.contains("no treatment condition"))
        );
    }

    #[test]
    fn reports_each_incomplete_task() {
        let mut manifest = standard_manifest();
        manifest.tasks[0].repo = String::new();
        manifest.tasks[0].commit = " ".to_string();
        manifest.tasks[0].acceptance_checks.clear();
        let issues = check_manifest(&manifest, Path::new("."), &FixedProbe::empty());
        let task_errors: Vec<_> = issues
            .iter()
            .filter(|issue| issue.scope == IssueScope::Task && issue.is_error())
            .collect();
        assert_eq!(task_errors.len(), 3);
        assert!(task_errors.iter().all(|issue| issue.id == "t1"));
    }

    #[test]
    fn prompt_file_must_exist() {
        let mut manifest = standard_manifest();
        manifest.tasks[0].prompt_file = Some(PathBuf::from("prompts/t1.md"));

        let issues = check_manifest(&manifest, Path::new("/exp"), &FixedProbe::empty());
        assert_eq!(count_issues(&issues), (1, 0));
        assert!(issues[0].message.contains("prompt file not found"));

        let probe = FixedProbe::with_paths(["/exp/prompts/t1.md"]);
        let issues = check_manifest(&manifest, Path::new("/exp"), &probe);
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_title_is_only_a_warning() {
        let mut manifest = standard_manifest();
        manifest.tasks[0].title.clear();
        let issues = check_manifest(&manifest, Path::new("."), &FixedProbe::empty());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }
}
