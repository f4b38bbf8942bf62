//! Persisted experiment documents: the manifest and individual run records.
//!
//! Both are loaded read-only; see `io::manifest_store` and `io::run_store`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Experiment definition (`manifest.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentManifest {
    pub experiment_id: String,
    #[serde(default)]
    pub description: String,
    /// Prefixes identifying treatment tooling in tool-call names.
    #[serde(default = "default_tool_prefixes")]
    pub tool_prefixes: Vec<String>,
    pub conditions: Vec<Condition>,
    pub tasks: Vec<Task>,
    /// Target number of runs for every (task, condition) cell.
    pub runs_per_cell: u32,
}

/// One experimental arm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `false` for control arms, `true` for treatment arms.
    pub tools_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One benchmark unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub repo: String,
    pub commit: String,
    #[serde(default)]
    pub acceptance_checks: Vec<String>,
    /// Prompt file, resolved against the manifest directory when relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// One observed agent execution (`runs/<run_id>.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub task_id: String,
    pub condition_id: String,
    /// Kept signed so non-positive values surface as validation issues.
    #[serde(default)]
    pub replicate: Option<i64>,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub model: String,
    pub succeeded: bool,
    pub compile_passed: bool,
    pub tests_passed: bool,
    pub duration_seconds: f64,
    #[serde(default)]
    pub tools_offered: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_run_reflection: Option<PostRunReflection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub tool_name: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Agent self-report written after a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRunReflection {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub helpful_tools: Vec<String>,
    #[serde(default)]
    pub unhelpful_tools: Vec<String>,
    /// Expected in `1..=5`; out-of-range values are reported, not rejected.
    #[serde(default, alias = "helpfulness_score")]
    pub roslyn_helpfulness_score: Option<i64>,
}

pub fn default_tool_prefixes() -> Vec<String> {
    vec!["roslyn".to_string()]
}

impl ExperimentManifest {
    pub fn condition(&self, id: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| ids_match(&c.id, id))
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| ids_match(&t.id, id))
    }

    /// First control condition in declaration order.
    pub fn primary_control(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| !c.tools_enabled)
    }

    /// First treatment condition in declaration order.
    pub fn primary_treatment(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.tools_enabled)
    }

    /// `tasks × conditions × runs_per_cell`.
    pub fn expected_runs(&self) -> usize {
        self.tasks.len() * self.conditions.len() * self.runs_per_cell as usize
    }
}

impl TokenUsage {
    /// Reported total, or input + output when only the parts are known.
    ///
    /// A sum that does not fit in `u64` is treated as unknown.
    pub fn effective_total(&self) -> Option<u64> {
        self.total_tokens.or(match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        })
    }
}

impl RunRecord {
    pub fn helpfulness_score(&self) -> Option<i64> {
        self.post_run_reflection
            .as_ref()
            .and_then(|reflection| reflection.roslyn_helpfulness_score)
    }

    pub fn in_cell(&self, task_id: &str, condition_id: &str) -> bool {
        ids_match(&self.task_id, task_id) && ids_match(&self.condition_id, condition_id)
    }
}

/// Identifier comparison used across the pipeline (case-insensitive).
pub fn ids_match(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

/// Canonical key for identifier sets.
pub fn id_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_legacy_score_key() {
        let input = r#"{
            "run_id": "r1",
            "task_id": "t1",
            "condition_id": "treatment",
            "succeeded": true,
            "compile_passed": true,
            "tests_passed": false,
            "duration_seconds": 12.5,
            "tool_calls": [{"tool_name": "roslyn_find_symbol", "ok": true}],
            "post_run_reflection": {"summary": "ok", "helpfulness_score": 4}
        }"#;
        let run: RunRecord = serde_json::from_str(input).expect("run parses");
        assert_eq!(run.helpfulness_score(), Some(4));
        assert_eq!(run.replicate, None);
        assert!(run.tools_offered.is_empty());
    }

    #[test]
    fn manifest_defaults_tool_prefixes() {
        let input = r#"{
            "experiment_id": "exp",
            "conditions": [{"id": "control", "tools_enabled": false}],
            "tasks": [{"id": "t1", "repo": "r", "commit": "c", "acceptance_checks": ["dotnet test"]}],
            "runs_per_cell": 1
        }"#;
        let manifest: ExperimentManifest = serde_json::from_str(input).expect("manifest parses");
        assert_eq!(manifest.tool_prefixes, vec!["roslyn"]);
        assert_eq!(manifest.expected_runs(), 1);
    }

    #[test]
    fn ids_compare_case_insensitively() {
        assert!(ids_match("Treatment", "treatment"));
        assert!(!ids_match("treatment", "treatment-2"));
        assert_eq!(id_key("Task-A"), "task-a");
    }
}
