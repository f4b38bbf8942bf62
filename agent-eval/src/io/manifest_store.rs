//! Manifest loading with fail-fast structural checks.
//!
//! Anything that leaves no component able to reason about the experiment
//! (unparseable document, schema violations, duplicate ids, empty condition or
//! task lists, non-positive `runs_per_cell`) aborts the load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::experiment::{ExperimentManifest, id_key};
use crate::io::document::DocumentStore;
use crate::io::schema::DocumentSchema;

/// A manifest plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: ExperimentManifest,
    pub path: PathBuf,
    /// SHA-256 of the canonical JSON document, for reproducibility tracking.
    pub sha256: String,
}

impl LoadedManifest {
    /// Directory that relative prompt-file paths resolve against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_manifest(store: &dyn DocumentStore, path: &Path) -> Result<LoadedManifest> {
    let document = store.load(path)?;
    DocumentSchema::manifest()?
        .check(&document)
        .with_context(|| format!("validate manifest {}", path.display()))?;
    let sha256 = document_sha256(&document)?;
    let manifest: ExperimentManifest = serde_json::from_value(document)
        .with_context(|| format!("deserialize manifest {}", path.display()))?;
    check_load_invariants(&manifest)
        .with_context(|| format!("invalid manifest {}", path.display()))?;
    debug!(
        experiment_id = %manifest.experiment_id,
        conditions = manifest.conditions.len(),
        tasks = manifest.tasks.len(),
        "manifest loaded"
    );
    Ok(LoadedManifest {
        manifest,
        path: path.to_path_buf(),
        sha256,
    })
}

/// Invariants without which no pipeline stage can run.
pub fn check_load_invariants(manifest: &ExperimentManifest) -> Result<()> {
    let mut errors = Vec::new();
    if manifest.experiment_id.trim().is_empty() {
        errors.push("experiment_id must be non-empty".to_string());
    }
    if manifest.conditions.is_empty() {
        errors.push("conditions must be a non-empty array".to_string());
    }
    if manifest.tasks.is_empty() {
        errors.push("tasks must be a non-empty array".to_string());
    }
    if manifest.runs_per_cell == 0 {
        errors.push("runs_per_cell must be > 0".to_string());
    }
    if manifest
        .tool_prefixes
        .iter()
        .all(|prefix| prefix.trim().is_empty())
    {
        errors.push("tool_prefixes must contain a non-empty prefix".to_string());
    }
    for (kind, ids) in [
        (
            "condition",
            manifest.conditions.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        ),
        ("task", manifest.tasks.iter().map(|t| t.id.as_str()).collect()),
    ] {
        duplicates(kind, ids.iter().copied(), &mut errors);
        for id in ids {
            if !is_file_safe_id(id) {
                errors.push(format!(
                    "{kind} id '{id}' must not contain path separators or '..'"
                ));
            }
        }
    }
    if !errors.is_empty() {
        bail!("manifest invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(())
}

fn duplicates<'a>(kind: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id_key(id)) {
            errors.push(format!("duplicate {kind} id '{id}'"));
        }
    }
}

/// Ids end up in draft run file names, so they must stay a single path component.
pub fn is_file_safe_id(id: &str) -> bool {
    !id.contains(['/', '\\']) && !id.contains("..")
}

fn document_sha256(document: &serde_json::Value) -> Result<String> {
    let bytes = serde_json::to_vec(document).context("serialize manifest for hashing")?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}
