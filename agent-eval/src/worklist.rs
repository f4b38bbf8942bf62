//! Worklist report and run-template materialization.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::types::PathProbe;
use crate::core::worklist::{Worklist, build_worklist};
use crate::experiment::{ExperimentManifest, RunRecord};
use crate::io::document::{DocumentStore, save_as};
use crate::io::templates::{TemplateOutcome, write_run_templates};

pub const WORKLIST_FILE: &str = "worklist.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklistReport {
    #[serde(flatten)]
    pub worklist: Worklist,
    pub output_path: PathBuf,
}

#[instrument(skip_all, fields(runs = runs.len()))]
pub fn plan_worklist(
    store: &dyn DocumentStore,
    manifest: &ExperimentManifest,
    runs: &[RunRecord],
    out: &Path,
) -> Result<WorklistReport> {
    let report = WorklistReport {
        worklist: build_worklist(manifest, runs),
        output_path: out.to_path_buf(),
    };
    save_as(store, out, &report).context("write worklist")?;
    info!(
        expected = report.worklist.expected_runs,
        observed = report.worklist.observed_runs,
        pending = report.worklist.pending_runs.len(),
        "worklist planned"
    );
    Ok(report)
}

/// Build the worklist and write one draft run document per pending entry.
pub fn materialize_templates(
    store: &dyn DocumentStore,
    probe: &dyn PathProbe,
    manifest: &ExperimentManifest,
    runs: &[RunRecord],
    out_dir: &Path,
    force: bool,
) -> Result<TemplateOutcome> {
    let worklist = build_worklist(manifest, runs);
    write_run_templates(store, probe, manifest, &worklist.pending_runs, out_dir, force)
        .with_context(|| format!("write run templates to {}", out_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, run, standard_manifest};

    #[test]
    fn report_is_persisted_with_pending_runs() {
        let store = MemoryStore::default();
        let out = Path::new("out/worklist.json");
        let mut observed = run("c1", "t1", "control");
        observed.replicate = Some(1);

        let report = plan_worklist(&store, &standard_manifest(), &[observed], out).expect("plan");
        assert_eq!(report.worklist.pending_runs.len(), 3);

        let saved = store.get(out).expect("saved");
        assert_eq!(saved["expected_runs"], 4);
        assert_eq!(saved["pending_runs"][0]["run_id"], "t1__control__r02");
        assert_eq!(saved["output_path"], "out/worklist.json");
    }

    #[test]
    fn templates_cover_every_pending_run() {
        let store = MemoryStore::default();
        let outcome = materialize_templates(
            &store,
            &store,
            &standard_manifest(),
            &[],
            Path::new("drafts"),
            false,
        )
        .expect("templates");
        assert_eq!(outcome.written.len(), 4);
        assert_eq!(store.paths().len(), 4);
    }
}
