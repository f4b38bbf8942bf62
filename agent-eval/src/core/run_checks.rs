//! Cross-checks run records against the manifest.
//!
//! Errors invalidate the run set; warnings (under-instrumented treatment runs,
//! low coverage) only limit what the data can show.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::tool_match::ToolMatcher;
use crate::core::types::{IssueScope, SENTINEL_ID, ValidationIssue, count_issues};
use crate::experiment::{ExperimentManifest, RunRecord, id_key};

/// Valid range for `roslyn_helpfulness_score`, as shown in issue messages.
pub const HELPFULNESS_RANGE: &str = "1..5";
pub const HELPFULNESS_MIN: i64 = 1;
pub const HELPFULNESS_MAX: i64 = 5;

/// Result of checking a run set. `valid` iff `error_count == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunValidation {
    pub valid: bool,
    pub total_runs: usize,
    pub expected_runs: usize,
    pub issue_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub contaminated_control_runs: usize,
    pub treatment_runs_without_tool_offered: usize,
    pub treatment_runs_without_tool_usage: usize,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Default)]
struct Counters {
    contaminated_control_runs: usize,
    without_tool_offered: usize,
    without_tool_usage: usize,
}

/// Check every run (in input order), then coverage.
pub fn check_runs(manifest: &ExperimentManifest, runs: &[RunRecord]) -> RunValidation {
    let matcher = ToolMatcher::new(&manifest.tool_prefixes);
    let mut issues = Vec::new();
    let mut counters = Counters::default();
    let mut seen_run_ids = HashSet::new();
    let mut seen_replicates = HashSet::new();

    for run in runs {
        let run_id = run.run_id.as_str();
        if run_id.trim().is_empty() {
            issues.push(ValidationIssue::error(
                IssueScope::Run,
                SENTINEL_ID,
                format!(
                    "run for task '{}' / condition '{}' has an empty run_id",
                    run.task_id, run.condition_id
                ),
            ));
        } else if !seen_run_ids.insert(id_key(run_id)) {
            issues.push(ValidationIssue::error(
                IssueScope::Run,
                run_id,
                format!("duplicate run_id '{run_id}'"),
            ));
        }

        let condition = manifest.condition(&run.condition_id);
        let task = manifest.task(&run.task_id);
        if condition.is_none() {
            issues.push(ValidationIssue::error(
                IssueScope::Run,
                run_id,
                format!("unknown condition_id '{}'", run.condition_id),
            ));
        }
        if task.is_none() {
            issues.push(ValidationIssue::error(
                IssueScope::Run,
                run_id,
                format!("unknown task_id '{}'", run.task_id),
            ));
        }

        if let Some(replicate) = run.replicate {
            if replicate <= 0 {
                issues.push(ValidationIssue::error(
                    IssueScope::Run,
                    run_id,
                    format!("replicate must be a positive integer (got {replicate})"),
                ));
            } else if condition.is_some()
                && task.is_some()
                && !seen_replicates.insert((
                    id_key(&run.task_id),
                    id_key(&run.condition_id),
                    replicate,
                ))
            {
                issues.push(ValidationIssue::warning(
                    IssueScope::Run,
                    run_id,
                    format!(
                        "replicate {replicate} is already used in cell ({}, {})",
                        run.task_id, run.condition_id
                    ),
                ));
            }
        }

        if let Some(condition) = condition {
            if condition.tools_enabled {
                check_treatment_run(&matcher, run, &mut issues, &mut counters);
            } else {
                check_control_run(&matcher, run, &mut issues, &mut counters);
            }
        }

        if let Some(score) = run.helpfulness_score()
            && !(HELPFULNESS_MIN..=HELPFULNESS_MAX).contains(&score)
        {
            issues.push(ValidationIssue::error(
                IssueScope::Run,
                run_id,
                format!(
                    "roslyn_helpfulness_score {score} is outside the valid range {HELPFULNESS_RANGE}"
                ),
            ));
        }
    }

    let expected_runs = manifest.expected_runs();
    if runs.len() < expected_runs {
        issues.push(ValidationIssue::warning(
            IssueScope::Experiment,
            SENTINEL_ID,
            format!(
                "observed run count {} is below expected {expected_runs}",
                runs.len()
            ),
        ));
    }

    let (error_count, warning_count) = count_issues(&issues);
    RunValidation {
        valid: error_count == 0,
        total_runs: runs.len(),
        expected_runs,
        issue_count: issues.len(),
        error_count,
        warning_count,
        contaminated_control_runs: counters.contaminated_control_runs,
        treatment_runs_without_tool_offered: counters.without_tool_offered,
        treatment_runs_without_tool_usage: counters.without_tool_usage,
        issues,
    }
}

/// A control run must not call treatment tooling. One issue per run.
fn check_control_run(
    matcher: &ToolMatcher,
    run: &RunRecord,
    issues: &mut Vec<ValidationIssue>,
    counters: &mut Counters,
) {
    let mut used: Vec<&str> = matcher
        .treatment_calls(run)
        .map(|call| call.tool_name.as_str())
        .collect();
    if used.is_empty() {
        return;
    }
    used.sort_unstable();
    used.dedup();
    counters.contaminated_control_runs += 1;
    issues.push(ValidationIssue::error(
        IssueScope::Run,
        run.run_id.as_str(),
        format!(
            "condition contamination: control condition '{}' called treatment tools [{}]",
            run.condition_id,
            used.join(", ")
        ),
    ));
}

fn check_treatment_run(
    matcher: &ToolMatcher,
    run: &RunRecord,
    issues: &mut Vec<ValidationIssue>,
    counters: &mut Counters,
) {
    if !matcher.offered_treatment_tool(run) {
        counters.without_tool_offered += 1;
        issues.push(ValidationIssue::warning(
            IssueScope::Run,
            run.run_id.as_str(),
            format!(
                "treatment condition '{}' did not offer any treatment tool",
                run.condition_id
            ),
        ));
    }
    if !matcher.used_treatment_tool(run) {
        counters.without_tool_usage += 1;
        issues.push(ValidationIssue::warning(
            IssueScope::Run,
            run.run_id.as_str(),
            format!(
                "treatment condition '{}' made no treatment tool calls",
                run.condition_id
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Severity;
    use crate::test_support::{run, run_with_score, run_with_tools, standard_manifest};

    fn full_run_set() -> Vec<RunRecord> {
        vec![
            run("c1", "t1", "control"),
            run("c2", "t1", "control"),
            run_with_tools("x1", "t1", "treatment", &["roslyn_find"], &["roslyn_find"]),
            run_with_tools("x2", "t1", "treatment", &["roslyn_find"], &["roslyn_find"]),
        ]
    }

    #[test]
    fn clean_full_run_set_is_valid_without_issues() {
        let report = check_runs(&standard_manifest(), &full_run_set());
        assert!(report.valid);
        assert_eq!(report.issue_count, 0, "issues: {:?}", report.issues);
        assert_eq!(report.total_runs, 4);
        assert_eq!(report.expected_runs, 4);
    }

    #[test]
    fn contaminated_control_run_yields_exactly_one_error() {
        let mut runs = full_run_set();
        runs[0] = run_with_tools(
            "c1",
            "t1",
            "control",
            &[],
            &["roslyn_find", "ROSLYN_rename", "roslyn_find"],
        );
        let report = check_runs(&standard_manifest(), &runs);

        assert!(!report.valid);
        assert_eq!(report.contaminated_control_runs, 1);
        let run_errors: Vec<_> = report
            .issues
            .iter()
            .filter(|issue| issue.id == "c1" && issue.is_error())
            .collect();
        assert_eq!(run_errors.len(), 1);
        assert!(run_errors[0].message.contains("condition contamination"));
    }

    #[test]
    fn under_instrumented_treatment_runs_are_warnings() {
        let mut runs = full_run_set();
        runs[2] = run_with_tools("x1", "t1", "treatment", &["bash"], &["bash"]);
        runs[3] = run_with_tools("x2", "t1", "treatment", &["roslyn_find"], &[]);
        let report = check_runs(&standard_manifest(), &runs);

        assert!(report.valid);
        assert_eq!(report.error_count, 0);
        assert_eq!(report.warning_count, 3);
        assert_eq!(report.treatment_runs_without_tool_offered, 1);
        assert_eq!(report.treatment_runs_without_tool_usage, 2);
    }

    #[test]
    fn helpfulness_score_range_is_enforced() {
        for (score, expect_error) in [(0, true), (6, true), (1, false), (5, false)] {
            let mut runs = full_run_set();
            runs[2] = run_with_score("x1", "t1", "treatment", Some(score));
            let report = check_runs(&standard_manifest(), &runs);
            let range_issue = report
                .issues
                .iter()
                .find(|issue| issue.message.contains(HELPFULNESS_RANGE));
            assert_eq!(range_issue.is_some(), expect_error, "score {score}");
            if let Some(issue) = range_issue {
                assert_eq!(issue.severity, Severity::Error);
                assert_eq!(issue.id, "x1");
            }
        }
    }

    #[test]
    fn reports_duplicates_unknown_refs_and_bad_replicates() {
        let mut runs = full_run_set();
        runs.push(run("C1", "t1", "control"));
        runs.push(run("ghost", "t9", "placebo"));
        let mut bad_replicate = run("neg", "t1", "control");
        bad_replicate.replicate = Some(0);
        runs.push(bad_replicate);

        let report = check_runs(&standard_manifest(), &runs);
        let messages: Vec<&str> = report.issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"duplicate run_id 'C1'"));
        assert!(messages.contains(&"unknown condition_id 'placebo'"));
        assert!(messages.contains(&"unknown task_id 't9'"));
        assert!(messages.contains(&"replicate must be a positive integer (got 0)"));
        assert_eq!(report.error_count, 4);
    }

    #[test]
    fn reused_replicate_in_cell_is_a_warning() {
        let mut runs = full_run_set();
        runs[0].replicate = Some(1);
        runs[1].replicate = Some(1);
        let report = check_runs(&standard_manifest(), &runs);
        assert!(report.valid);
        assert_eq!(report.warning_count, 1);
        assert!(report.issues[0].message.contains("replicate 1 is already used"));
    }

    #[test]
    fn low_coverage_emits_single_sentinel_warning() {
        let runs = vec![run("c1", "t1", "control")];
        let report = check_runs(&standard_manifest(), &runs);
        let coverage: Vec<_> = report
            .issues
            .iter()
            .filter(|issue| issue.scope == IssueScope::Experiment)
            .collect();
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].id, SENTINEL_ID);
        assert_eq!(coverage[0].severity, Severity::Warning);
        assert!(coverage[0].message.contains("below expected 4"));
        assert!(report.valid);
    }
}
