//! Per-condition aggregation and control-vs-treatment comparison.
//!
//! All rates are `count / run_count` and are exactly `0.0` when a condition
//! has no runs. Averages that are undefined stay `None` rather than `0.0`.

use serde::{Deserialize, Serialize};

use crate::core::run_checks::{HELPFULNESS_MAX, HELPFULNESS_MIN};
use crate::core::tool_match::ToolMatcher;
use crate::experiment::{Condition, ExperimentManifest, RunRecord, ids_match};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub condition_id: String,
    pub condition_name: String,
    pub tools_enabled: bool,
    pub run_count: usize,
    pub succeeded_runs: usize,
    pub compile_passed_runs: usize,
    pub tests_passed_runs: usize,
    pub success_rate: f64,
    pub compile_rate: f64,
    pub tests_rate: f64,
    pub average_duration_seconds: Option<f64>,
    pub roslyn_used_runs: usize,
    pub roslyn_used_rate: f64,
    pub total_tool_calls: usize,
    pub roslyn_tool_calls: usize,
    pub roslyn_call_share: f64,
    /// Scores within `1..=5`; out-of-range scores are validation errors and are not averaged.
    pub helpfulness_score_count: usize,
    pub average_roslyn_helpfulness_score: Option<f64>,
    pub average_input_tokens: Option<f64>,
    pub average_output_tokens: Option<f64>,
    pub average_total_tokens: Option<f64>,
}

/// Control-vs-treatment comparison. Always present; see [`ComparisonOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ComparisonDoc", try_from = "ComparisonDoc")]
pub struct Comparison {
    pub control_condition_id: Option<String>,
    pub treatment_condition_id: Option<String>,
    pub control_runs: usize,
    pub treatment_runs: usize,
    pub outcome: ComparisonOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Both sides have at least one run.
    Computed(ComparisonDeltas),
    /// At least one side is missing or empty.
    Insufficient(InsufficientData),
}

/// `treatment − control` deltas plus treatment's own usage numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonDeltas {
    pub success_rate_delta: f64,
    pub compile_rate_delta: f64,
    pub tests_rate_delta: f64,
    pub roslyn_used_rate_in_treatment: f64,
    pub roslyn_call_share_in_treatment: f64,
    #[serde(default)]
    pub helpfulness_score_in_treatment: Option<f64>,
    #[serde(default)]
    pub total_tokens_delta: Option<f64>,
    #[serde(default)]
    pub total_tokens_ratio: Option<f64>,
}

/// Partial numbers for whichever side has data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientData {
    pub note: String,
    #[serde(default)]
    pub control_success_rate: Option<f64>,
    #[serde(default)]
    pub treatment_success_rate: Option<f64>,
    #[serde(default)]
    pub roslyn_used_rate_in_treatment: Option<f64>,
}

/// Wire shape: the tagged outcome flattened next to an explicit flag.
#[derive(Serialize, Deserialize)]
struct ComparisonDoc {
    control_condition_id: Option<String>,
    treatment_condition_id: Option<String>,
    control_runs: usize,
    treatment_runs: usize,
    sufficient_data: bool,
    #[serde(flatten)]
    outcome: ComparisonOutcome,
}

impl From<Comparison> for ComparisonDoc {
    fn from(value: Comparison) -> Self {
        Self {
            sufficient_data: value.sufficient_data(),
            control_condition_id: value.control_condition_id,
            treatment_condition_id: value.treatment_condition_id,
            control_runs: value.control_runs,
            treatment_runs: value.treatment_runs,
            outcome: value.outcome,
        }
    }
}

impl TryFrom<ComparisonDoc> for Comparison {
    type Error = String;

    fn try_from(doc: ComparisonDoc) -> Result<Self, Self::Error> {
        let comparison = Comparison {
            control_condition_id: doc.control_condition_id,
            treatment_condition_id: doc.treatment_condition_id,
            control_runs: doc.control_runs,
            treatment_runs: doc.treatment_runs,
            outcome: doc.outcome,
        };
        if comparison.sufficient_data() != doc.sufficient_data {
            return Err(format!(
                "sufficient_data={} contradicts comparison status",
                doc.sufficient_data
            ));
        }
        Ok(comparison)
    }
}

impl Comparison {
    pub fn sufficient_data(&self) -> bool {
        matches!(self.outcome, ComparisonOutcome::Computed(_))
    }

    pub fn note(&self) -> Option<&str> {
        match &self.outcome {
            ComparisonOutcome::Computed(_) => None,
            ComparisonOutcome::Insufficient(data) => Some(data.note.as_str()),
        }
    }

    pub fn deltas(&self) -> Option<&ComparisonDeltas> {
        match &self.outcome {
            ComparisonOutcome::Computed(deltas) => Some(deltas),
            ComparisonOutcome::Insufficient(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComparison {
    pub task_id: String,
    pub comparison: Comparison,
}

/// Everything the scorer derives from one manifest + run set.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub condition_summaries: Vec<ConditionSummary>,
    pub primary_comparison: Comparison,
    pub task_comparisons: Vec<TaskComparison>,
}

pub fn score(manifest: &ExperimentManifest, runs: &[RunRecord]) -> Scorecard {
    let matcher = ToolMatcher::new(&manifest.tool_prefixes);
    let condition_summaries: Vec<ConditionSummary> = manifest
        .conditions
        .iter()
        .map(|condition| summarize_condition(condition, &runs_for(runs, condition, None), &matcher))
        .collect();

    let control = manifest.primary_control();
    let treatment = manifest.primary_treatment();
    let find_summary = |condition: Option<&Condition>| {
        condition.and_then(|condition| {
            condition_summaries
                .iter()
                .find(|summary| ids_match(&summary.condition_id, &condition.id))
        })
    };
    let primary_comparison = compare(find_summary(control), find_summary(treatment));

    let task_comparisons = manifest
        .tasks
        .iter()
        .map(|task| {
            let summarize = |condition: Option<&Condition>| {
                condition.map(|condition| {
                    summarize_condition(
                        condition,
                        &runs_for(runs, condition, Some(&task.id)),
                        &matcher,
                    )
                })
            };
            let control_summary = summarize(control);
            let treatment_summary = summarize(treatment);
            TaskComparison {
                task_id: task.id.clone(),
                comparison: compare(control_summary.as_ref(), treatment_summary.as_ref()),
            }
        })
        .collect();

    Scorecard {
        condition_summaries,
        primary_comparison,
        task_comparisons,
    }
}

fn runs_for<'a>(
    runs: &'a [RunRecord],
    condition: &Condition,
    task_id: Option<&str>,
) -> Vec<&'a RunRecord> {
    runs.iter()
        .filter(|run| ids_match(&run.condition_id, &condition.id))
        .filter(|run| task_id.is_none_or(|task_id| ids_match(&run.task_id, task_id)))
        .collect()
}

pub fn summarize_condition(
    condition: &Condition,
    runs: &[&RunRecord],
    matcher: &ToolMatcher,
) -> ConditionSummary {
    let run_count = runs.len();
    let count = |predicate: fn(&RunRecord) -> bool| runs.iter().filter(|run| predicate(run)).count();
    let succeeded_runs = count(|run| run.succeeded);
    let compile_passed_runs = count(|run| run.compile_passed);
    let tests_passed_runs = count(|run| run.tests_passed);

    let roslyn_used_runs = runs
        .iter()
        .filter(|run| matcher.used_treatment_tool(run))
        .count();
    let total_tool_calls: usize = runs.iter().map(|run| run.tool_calls.len()).sum();
    let roslyn_tool_calls: usize = runs
        .iter()
        .map(|run| matcher.treatment_calls(run).count())
        .sum();

    let scores: Vec<f64> = runs
        .iter()
        .filter_map(|run| run.helpfulness_score())
        .filter(|score| (HELPFULNESS_MIN..=HELPFULNESS_MAX).contains(score))
        .map(|score| score as f64)
        .collect();
    let token_mean = |field: fn(&RunRecord) -> Option<u64>| {
        mean(runs.iter().filter_map(|run| field(run)).map(|value| value as f64))
    };

    ConditionSummary {
        condition_id: condition.id.clone(),
        condition_name: condition.name.clone(),
        tools_enabled: condition.tools_enabled,
        run_count,
        succeeded_runs,
        compile_passed_runs,
        tests_passed_runs,
        success_rate: rate(succeeded_runs, run_count),
        compile_rate: rate(compile_passed_runs, run_count),
        tests_rate: rate(tests_passed_runs, run_count),
        average_duration_seconds: mean(runs.iter().map(|run| run.duration_seconds)),
        roslyn_used_runs,
        roslyn_used_rate: rate(roslyn_used_runs, run_count),
        total_tool_calls,
        roslyn_tool_calls,
        roslyn_call_share: rate(roslyn_tool_calls, total_tool_calls),
        helpfulness_score_count: scores.len(),
        average_roslyn_helpfulness_score: mean(scores.iter().copied()),
        average_input_tokens: token_mean(|run| {
            run.token_usage.as_ref().and_then(|usage| usage.input_tokens)
        }),
        average_output_tokens: token_mean(|run| {
            run.token_usage.as_ref().and_then(|usage| usage.output_tokens)
        }),
        average_total_tokens: token_mean(|run| {
            run.token_usage.as_ref().and_then(|usage| usage.effective_total())
        }),
    }
}

/// Build the comparison; insufficient unless both sides have ≥1 run.
pub fn compare(
    control: Option<&ConditionSummary>,
    treatment: Option<&ConditionSummary>,
) -> Comparison {
    let control_runs = control.map_or(0, |summary| summary.run_count);
    let treatment_runs = treatment.map_or(0, |summary| summary.run_count);
    let outcome = match (control, treatment) {
        (Some(control), Some(treatment)) if control_runs > 0 && treatment_runs > 0 => {
            ComparisonOutcome::Computed(deltas(control, treatment))
        }
        _ => ComparisonOutcome::Insufficient(InsufficientData {
            note: insufficiency_note(control, treatment),
            control_success_rate: control
                .filter(|summary| summary.run_count > 0)
                .map(|summary| summary.success_rate),
            treatment_success_rate: treatment
                .filter(|summary| summary.run_count > 0)
                .map(|summary| summary.success_rate),
            roslyn_used_rate_in_treatment: treatment
                .filter(|summary| summary.run_count > 0)
                .map(|summary| summary.roslyn_used_rate),
        }),
    };
    Comparison {
        control_condition_id: control.map(|summary| summary.condition_id.clone()),
        treatment_condition_id: treatment.map(|summary| summary.condition_id.clone()),
        control_runs,
        treatment_runs,
        outcome,
    }
}

fn deltas(control: &ConditionSummary, treatment: &ConditionSummary) -> ComparisonDeltas {
    let (total_tokens_delta, total_tokens_ratio) =
        match (control.average_total_tokens, treatment.average_total_tokens) {
            (Some(control_tokens), Some(treatment_tokens)) => (
                Some(treatment_tokens - control_tokens),
                (control_tokens > 0.0).then(|| treatment_tokens / control_tokens),
            ),
            _ => (None, None),
        };
    ComparisonDeltas {
        success_rate_delta: treatment.success_rate - control.success_rate,
        compile_rate_delta: treatment.compile_rate - control.compile_rate,
        tests_rate_delta: treatment.tests_rate - control.tests_rate,
        roslyn_used_rate_in_treatment: treatment.roslyn_used_rate,
        roslyn_call_share_in_treatment: treatment.roslyn_call_share,
        helpfulness_score_in_treatment: treatment.average_roslyn_helpfulness_score,
        total_tokens_delta,
        total_tokens_ratio,
    }
}

fn insufficiency_note(
    control: Option<&ConditionSummary>,
    treatment: Option<&ConditionSummary>,
) -> String {
    let (control, treatment) = match (control, treatment) {
        (None, None) => return "no control or treatment condition declared".to_string(),
        (None, Some(_)) => return "no control condition declared".to_string(),
        (Some(_), None) => return "no treatment condition declared".to_string(),
        (Some(control), Some(treatment)) => (control, treatment),
    };
    let empty: Vec<String> = [control, treatment]
        .iter()
        .filter(|summary| summary.run_count == 0)
        .map(|summary| {
            let role = if summary.tools_enabled {
                "treatment"
            } else {
                "control"
            };
            format!("{role} '{}'", summary.condition_id)
        })
        .collect();
    format!(
        "no runs recorded for {}; collect more data",
        empty.join(" and ")
    )
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}
