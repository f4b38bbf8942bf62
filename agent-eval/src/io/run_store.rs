//! Run directory loading: one JSON document per run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, instrument};

use crate::experiment::{RunRecord, id_key};
use crate::io::document::DocumentStore;
use crate::io::schema::DocumentSchema;

/// Load every run file in `dir` matching `pattern`, ordered by path.
///
/// Parse failures, schema violations, malformed shapes, and duplicate run ids
/// abort the load with the offending path named.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_runs(store: &dyn DocumentStore, dir: &Path, pattern: &Regex) -> Result<Vec<RunRecord>> {
    let documents = store
        .load_all(dir, pattern)
        .with_context(|| format!("load runs from {}", dir.display()))?;
    let schema = DocumentSchema::run()?;

    let mut runs = Vec::with_capacity(documents.len());
    let mut sources: HashMap<String, PathBuf> = HashMap::new();
    for (path, document) in documents {
        schema
            .check(&document)
            .with_context(|| format!("validate run {}", path.display()))?;
        let run: RunRecord = serde_json::from_value(document)
            .with_context(|| format!("deserialize run {}", path.display()))?;
        check_shape(&run).with_context(|| format!("invalid run {}", path.display()))?;
        if let Some(previous) = sources.insert(id_key(&run.run_id), path.clone()) {
            bail!(
                "duplicate run_id '{}' in {} and {}",
                run.run_id,
                previous.display(),
                path.display()
            );
        }
        runs.push(run);
    }
    debug!(count = runs.len(), "runs loaded");
    Ok(runs)
}

fn check_shape(run: &RunRecord) -> Result<()> {
    for (field, value) in [
        ("run_id", &run.run_id),
        ("task_id", &run.task_id),
        ("condition_id", &run.condition_id),
    ] {
        if value.trim().is_empty() {
            bail!("{field} must be non-empty");
        }
    }
    if !run.duration_seconds.is_finite() || run.duration_seconds < 0.0 {
        bail!(
            "duration_seconds must be a finite non-negative number (got {})",
            run.duration_seconds
        );
    }
    Ok(())
}
