//! Backfill planning: missing runs per (task, condition) cell.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::experiment::{ExperimentManifest, RunRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistCell {
    pub task_id: String,
    pub condition_id: String,
    pub target_runs: usize,
    pub observed_runs: usize,
    pub missing_runs: usize,
    /// Positive replicate numbers already present in the cell, ascending.
    pub used_replicates: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRun {
    pub run_id: String,
    pub task_id: String,
    pub condition_id: String,
    pub replicate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worklist {
    pub expected_runs: usize,
    pub observed_runs: usize,
    pub completion_rate: f64,
    pub cells: Vec<WorklistCell>,
    pub pending_runs: Vec<PendingRun>,
}

/// Build cells in manifest order (tasks outer, conditions inner).
pub fn build_worklist(manifest: &ExperimentManifest, runs: &[RunRecord]) -> Worklist {
    let target = manifest.runs_per_cell as usize;
    let mut cells = Vec::with_capacity(manifest.tasks.len() * manifest.conditions.len());
    let mut pending_runs = Vec::new();

    for task in &manifest.tasks {
        for condition in &manifest.conditions {
            let cell_runs: Vec<&RunRecord> = runs
                .iter()
                .filter(|run| run.in_cell(&task.id, &condition.id))
                .collect();
            let mut used: BTreeSet<i64> = cell_runs
                .iter()
                .filter_map(|run| run.replicate)
                .filter(|replicate| *replicate > 0)
                .collect();
            let used_replicates = used.iter().copied().collect();

            let observed = cell_runs.len();
            let missing = target.saturating_sub(observed);
            for replicate in next_free_replicates(&mut used, missing) {
                pending_runs.push(PendingRun {
                    run_id: pending_run_id(&task.id, &condition.id, replicate),
                    task_id: task.id.clone(),
                    condition_id: condition.id.clone(),
                    replicate,
                });
            }

            cells.push(WorklistCell {
                task_id: task.id.clone(),
                condition_id: condition.id.clone(),
                target_runs: target,
                observed_runs: observed,
                missing_runs: missing,
                used_replicates,
            });
        }
    }

    let expected_runs = manifest.expected_runs();
    let observed_runs = runs.len();
    Worklist {
        expected_runs,
        observed_runs,
        completion_rate: completion_rate(observed_runs, expected_runs),
        cells,
        pending_runs,
    }
}

/// Take `count` free replicate numbers, ascending from 1, marking each as used.
pub fn next_free_replicates(used: &mut BTreeSet<i64>, count: usize) -> Vec<i64> {
    let mut assigned = Vec::with_capacity(count);
    let mut candidate = 1;
    while assigned.len() < count {
        if used.insert(candidate) {
            assigned.push(candidate);
        }
        candidate += 1;
    }
    assigned
}

pub fn pending_run_id(task_id: &str, condition_id: &str, replicate: i64) -> String {
    format!("{task_id}__{condition_id}__r{replicate:02}")
}

fn completion_rate(observed: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    (observed as f64 / expected as f64).min(1.0)
}
