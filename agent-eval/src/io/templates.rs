//! Draft run documents for pending worklist entries.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::core::types::PathProbe;
use crate::core::worklist::PendingRun;
use crate::experiment::{ExperimentManifest, PostRunReflection, RunRecord};
use crate::io::document::{DocumentStore, save_as};
use crate::io::manifest_store::is_file_safe_id;

pub const PLACEHOLDER: &str = "TODO";

/// Files written and files left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOutcome {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Placeholder run record for one pending entry.
pub fn run_template(manifest: &ExperimentManifest, pending: &PendingRun) -> Result<RunRecord> {
    let Some(condition) = manifest.condition(&pending.condition_id) else {
        bail!(
            "pending run '{}' references unknown condition '{}'",
            pending.run_id,
            pending.condition_id
        );
    };
    let tools_offered = if condition.tools_enabled {
        manifest.tool_prefixes.clone()
    } else {
        Vec::new()
    };
    Ok(RunRecord {
        run_id: pending.run_id.clone(),
        task_id: pending.task_id.clone(),
        condition_id: pending.condition_id.clone(),
        replicate: Some(pending.replicate),
        agent: PLACEHOLDER.to_string(),
        model: PLACEHOLDER.to_string(),
        succeeded: false,
        compile_passed: false,
        tests_passed: false,
        duration_seconds: 0.0,
        tools_offered,
        tool_calls: Vec::new(),
        token_usage: None,
        post_run_reflection: Some(PostRunReflection {
            summary: PLACEHOLDER.to_string(),
            ..PostRunReflection::default()
        }),
    })
}

/// `<out_dir>/<run_id>.json`, refusing run ids that would leave `out_dir`.
pub fn draft_path(out_dir: &Path, run_id: &str) -> Result<PathBuf> {
    if run_id.is_empty() || !is_file_safe_id(run_id) {
        bail!(
            "run id '{run_id}' does not name a file inside {}",
            out_dir.display()
        );
    }
    Ok(out_dir.join(format!("{run_id}.json")))
}

/// Write `<out_dir>/<run_id>.json` for every pending run.
///
/// Existing files are skipped unless `force`. Every path is checked before
/// the first write.
#[instrument(skip_all, fields(out_dir = %out_dir.display(), pending = pending.len()))]
pub fn write_run_templates(
    store: &dyn DocumentStore,
    probe: &dyn PathProbe,
    manifest: &ExperimentManifest,
    pending: &[PendingRun],
    out_dir: &Path,
    force: bool,
) -> Result<TemplateOutcome> {
    let paths = pending
        .iter()
        .map(|entry| draft_path(out_dir, &entry.run_id))
        .collect::<Result<Vec<_>>>()?;
    let mut outcome = TemplateOutcome::default();
    for (entry, path) in pending.iter().zip(paths) {
        if !force && probe.exists(&path) {
            debug!(path = %path.display(), "template exists; skipping");
            outcome.skipped.push(path);
            continue;
        }
        let record = run_template(manifest, entry)?;
        save_as(store, &path, &record)?;
        outcome.written.push(path);
    }
    Ok(outcome)
}
