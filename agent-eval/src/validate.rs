//! Manifest and run validation reports for `validate-manifest`, `validate-runs`, and `gate`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::manifest_checks::check_manifest;
use crate::core::run_checks::{RunValidation, check_runs};
use crate::core::types::{PathProbe, ValidationIssue, count_issues};
use crate::experiment::{ExperimentManifest, RunRecord};
use crate::io::document::{DocumentStore, save_as};
use crate::io::manifest_store::LoadedManifest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestValidationReport {
    pub experiment_id: String,
    pub valid: bool,
    pub issue_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub issues: Vec<ValidationIssue>,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunValidationReport {
    #[serde(flatten)]
    pub validation: RunValidation,
    pub output_path: PathBuf,
}

impl RunValidationReport {
    pub fn valid(&self) -> bool {
        self.validation.valid
    }
}

/// Check the manifest's referential and completeness rules and persist the report.
#[instrument(skip_all, fields(experiment_id = %loaded.manifest.experiment_id))]
pub fn validate_manifest(
    store: &dyn DocumentStore,
    probe: &dyn PathProbe,
    loaded: &LoadedManifest,
    out: &Path,
) -> Result<ManifestValidationReport> {
    let issues = check_manifest(&loaded.manifest, loaded.base_dir(), probe);
    let (error_count, warning_count) = count_issues(&issues);
    let report = ManifestValidationReport {
        experiment_id: loaded.manifest.experiment_id.clone(),
        valid: error_count == 0,
        issue_count: issues.len(),
        error_count,
        warning_count,
        issues,
        output_path: out.to_path_buf(),
    };
    save_as(store, out, &report).context("write manifest validation report")?;
    info!(valid = report.valid, errors = error_count, warnings = warning_count, "manifest validated");
    Ok(report)
}

/// Check every run against the manifest and persist the report.
#[instrument(skip_all, fields(runs = runs.len()))]
pub fn validate_runs(
    store: &dyn DocumentStore,
    manifest: &ExperimentManifest,
    runs: &[RunRecord],
    out: &Path,
) -> Result<RunValidationReport> {
    let report = RunValidationReport {
        validation: check_runs(manifest, runs),
        output_path: out.to_path_buf(),
    };
    save_as(store, out, &report).context("write run validation report")?;
    info!(
        valid = report.validation.valid,
        errors = report.validation.error_count,
        warnings = report.validation.warning_count,
        "runs validated"
    );
    Ok(report)
}
