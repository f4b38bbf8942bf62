//! Score report for `score` and `gate`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::scoring::{Comparison, ConditionSummary, TaskComparison, score};
use crate::experiment::RunRecord;
use crate::io::document::{DocumentStore, save_as};
use crate::io::manifest_store::LoadedManifest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub experiment_id: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    pub manifest_sha256: String,
    pub total_runs: usize,
    /// Mirrors `primary_comparison.sufficient_data`.
    pub sufficient_data: bool,
    pub condition_summaries: Vec<ConditionSummary>,
    pub primary_comparison: Comparison,
    pub task_comparisons: Vec<TaskComparison>,
    pub output_path: PathBuf,
}

#[instrument(skip_all, fields(experiment_id = %loaded.manifest.experiment_id, runs = runs.len()))]
pub fn score_runs(
    store: &dyn DocumentStore,
    loaded: &LoadedManifest,
    runs: &[RunRecord],
    out: &Path,
) -> Result<ScoreReport> {
    let scorecard = score(&loaded.manifest, runs);
    let report = ScoreReport {
        experiment_id: loaded.manifest.experiment_id.clone(),
        generated_at: Utc::now().to_rfc3339(),
        manifest_sha256: loaded.sha256.clone(),
        total_runs: runs.len(),
        sufficient_data: scorecard.primary_comparison.sufficient_data(),
        condition_summaries: scorecard.condition_summaries,
        primary_comparison: scorecard.primary_comparison,
        task_comparisons: scorecard.task_comparisons,
        output_path: out.to_path_buf(),
    };
    save_as(store, out, &report).context("write score report")?;
    info!(sufficient_data = report.sufficient_data, "scored");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, run, run_with_tools, standard_manifest};

    fn loaded() -> LoadedManifest {
        LoadedManifest {
            manifest: standard_manifest(),
            path: PathBuf::from("manifest.json"),
            sha256: "ab".repeat(32),
        }
    }

    #[test]
    fn report_carries_provenance_and_round_trips() {
        let store = MemoryStore::default();
        let out = Path::new("out/score.json");
        let runs = vec![
            run("c1", "t1", "control"),
            run_with_tools("x1", "t1", "treatment", &["roslyn"], &["roslyn_find"]),
        ];

        let report = score_runs(&store, &loaded(), &runs, out).expect("score");
        assert!(report.sufficient_data);
        assert_eq!(report.total_runs, 2);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());

        let saved = store.get(out).expect("saved");
        assert_eq!(saved["manifest_sha256"], "ab".repeat(32));
        assert_eq!(saved["primary_comparison"]["status"], "computed");
        let parsed: ScoreReport = serde_json::from_value(saved).expect("parse");
        assert_eq!(parsed, report);
    }

    #[test]
    fn insufficient_report_still_lists_every_condition() {
        let store = MemoryStore::default();
        let report =
            score_runs(&store, &loaded(), &[], Path::new("score.json")).expect("score");
        assert!(!report.sufficient_data);
        assert_eq!(report.condition_summaries.len(), 2);
        assert!(report.primary_comparison.note().is_some());
    }
}
