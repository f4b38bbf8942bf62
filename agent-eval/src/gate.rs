//! End-to-end gate: validate, score, summarize, decide.
//!
//! Every stage runs regardless of earlier outcomes so all reports are
//! produced; only fatal errors (and cancellation) stop the pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::gate::{GateInputs, decide};
use crate::core::types::PathProbe;
use crate::export::write_summary;
use crate::io::document::{DocumentStore, save_as};
use crate::io::manifest_store::load_manifest;
use crate::io::run_store::load_runs;
use crate::score::score_runs;
use crate::validate::{validate_manifest, validate_runs};

pub const MANIFEST_VALIDATION_FILE: &str = "manifest_validation.json";
pub const RUN_VALIDATION_FILE: &str = "run_validation.json";
pub const SCORE_FILE: &str = "score.json";
pub const SUMMARY_FILE: &str = "summary.md";
pub const GATE_REPORT_FILE: &str = "gate_report.json";

#[derive(Debug, Clone)]
pub struct GateOptions {
    pub manifest_path: PathBuf,
    pub runs_dir: PathBuf,
    pub out_dir: PathBuf,
    pub run_file_pattern: Regex,
    pub fail_on_run_warnings: bool,
    pub max_export_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub experiment_id: String,
    pub generated_at: String,
    pub manifest_valid: bool,
    pub runs_valid: bool,
    pub sufficient_data: bool,
    pub fail_on_run_warnings: bool,
    pub gate_passed: bool,
    pub run_validation_error_count: usize,
    pub run_validation_warning_count: usize,
    pub notes: Vec<String>,
    pub manifest_validation_path: PathBuf,
    pub run_validation_path: PathBuf,
    pub score_path: PathBuf,
    pub summary_path: PathBuf,
}

impl GateReport {
    pub fn path(out_dir: &Path) -> PathBuf {
        out_dir.join(GATE_REPORT_FILE)
    }
}

#[instrument(skip_all, fields(manifest = %options.manifest_path.display(), runs = %options.runs_dir.display()))]
pub fn run_gate(
    store: &dyn DocumentStore,
    probe: &dyn PathProbe,
    options: &GateOptions,
    cancel: &CancelToken,
) -> Result<GateReport> {
    let out_dir = options.out_dir.as_path();
    let manifest_validation_path = out_dir.join(MANIFEST_VALIDATION_FILE);
    let run_validation_path = out_dir.join(RUN_VALIDATION_FILE);
    let score_path = out_dir.join(SCORE_FILE);
    let summary_path = out_dir.join(SUMMARY_FILE);

    cancel.check("manifest load")?;
    let loaded = load_manifest(store, &options.manifest_path)?;

    cancel.check("manifest validation")?;
    let manifest_report = validate_manifest(store, probe, &loaded, &manifest_validation_path)?;

    cancel.check("run load")?;
    let runs = load_runs(store, &options.runs_dir, &options.run_file_pattern)?;

    cancel.check("run validation")?;
    let run_report = validate_runs(store, &loaded.manifest, &runs, &run_validation_path)?;

    cancel.check("scoring")?;
    let score_report = score_runs(store, &loaded, &runs, &score_path)?;

    cancel.check("summary export")?;
    write_summary(
        &score_report,
        &run_report,
        options.max_export_issues,
        &summary_path,
    )
    .context("write summary")?;

    let validation = &run_report.validation;
    let decision = decide(&GateInputs {
        manifest_valid: manifest_report.valid,
        manifest_error_count: manifest_report.error_count,
        runs_valid: validation.valid,
        run_error_count: validation.error_count,
        run_warning_count: validation.warning_count,
        sufficient_data: score_report.sufficient_data,
        insufficiency_note: score_report.primary_comparison.note(),
        fail_on_run_warnings: options.fail_on_run_warnings,
    });

    let report = GateReport {
        experiment_id: loaded.manifest.experiment_id.clone(),
        generated_at: Utc::now().to_rfc3339(),
        manifest_valid: manifest_report.valid,
        runs_valid: validation.valid,
        sufficient_data: score_report.sufficient_data,
        fail_on_run_warnings: options.fail_on_run_warnings,
        gate_passed: decision.gate_passed,
        run_validation_error_count: validation.error_count,
        run_validation_warning_count: validation.warning_count,
        notes: decision.notes,
        manifest_validation_path,
        run_validation_path,
        score_path,
        summary_path,
    };

    cancel.check("gate report")?;
    save_as(store, &GateReport::path(out_dir), &report).context("write gate report")?;
    if report.gate_passed {
        info!("gate passed");
    } else {
        warn!(notes = ?report.notes, "gate failed");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::document::JsonFileStore;
    use crate::io::probe::FsProbe;
    use crate::test_support::{ExperimentDir, run, run_with_tools, standard_manifest};

    fn options(dir: &ExperimentDir, fail_on_run_warnings: bool) -> GateOptions {
        GateOptions {
            manifest_path: dir.manifest_path.clone(),
            runs_dir: dir.runs_dir.clone(),
            out_dir: dir.out_dir.clone(),
            run_file_pattern: Regex::new(r"^.*\.json$").expect("regex"),
            fail_on_run_warnings,
            max_export_issues: 20,
        }
    }

    #[test]
    fn passing_gate_writes_every_report() {
        let dir = ExperimentDir::new(&standard_manifest()).expect("experiment dir");
        dir.add_run(&run("c1", "t1", "control")).expect("c1");
        dir.add_run(&run_with_tools("x1", "t1", "treatment", &["roslyn"], &["roslyn_find"]))
            .expect("x1");

        let report = run_gate(
            &JsonFileStore::default(),
            &FsProbe,
            &options(&dir, false),
            &CancelToken::new(),
        )
        .expect("gate");

        assert!(report.gate_passed, "notes: {:?}", report.notes);
        assert!(report.notes.is_empty());
        assert_eq!(report.run_validation_warning_count, 1);
        for path in [
            &report.manifest_validation_path,
            &report.run_validation_path,
            &report.score_path,
            &report.summary_path,
        ] {
            assert!(path.is_file(), "{} missing", path.display());
        }
        assert!(GateReport::path(&dir.out_dir).is_file());
    }

    #[test]
    fn warning_policy_fails_gate_with_note() {
        let dir = ExperimentDir::new(&standard_manifest()).expect("experiment dir");
        dir.add_run(&run("c1", "t1", "control")).expect("c1");
        dir.add_run(&run_with_tools("x1", "t1", "treatment", &["roslyn"], &["roslyn_find"]))
            .expect("x1");

        let report = run_gate(
            &JsonFileStore::default(),
            &FsProbe,
            &options(&dir, true),
            &CancelToken::new(),
        )
        .expect("gate");

        assert!(!report.gate_passed);
        assert_eq!(
            report.notes,
            vec![
                "hard failures: 1 run validation warning(s) with fail_on_run_warnings enabled"
                    .to_string()
            ]
        );
    }

    #[test]
    fn invalid_runs_and_missing_data_do_not_short_circuit() {
        let mut manifest = standard_manifest();
        manifest.conditions.retain(|c| !c.tools_enabled);
        let dir = ExperimentDir::new(&manifest).expect("experiment dir");
        dir.add_run(&run_with_tools("c1", "t1", "control", &[], &["roslyn_find"]))
            .expect("c1");

        let report = run_gate(
            &JsonFileStore::default(),
            &FsProbe,
            &options(&dir, false),
            &CancelToken::new(),
        )
        .expect("gate");

        assert!(!report.gate_passed);
        assert!(!report.manifest_valid);
        assert!(!report.runs_valid);
        assert!(!report.sufficient_data);
        assert_eq!(report.notes.len(), 3);
        assert!(report.notes[0].starts_with("manifest validation failed with 1 error(s)"));
        assert!(report.notes[1].starts_with("run validation failed with 1 error(s)"));
        assert!(report.notes[2].starts_with("insufficient data: "));
        assert!(report.score_path.is_file());
    }

    #[test]
    fn cancellation_stops_before_first_stage() {
        let dir = ExperimentDir::new(&standard_manifest()).expect("experiment dir");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = run_gate(
            &JsonFileStore::default(),
            &FsProbe,
            &options(&dir, false),
            &cancel,
        )
        .expect_err("cancelled");
        assert!(err.to_string().contains("cancelled before manifest load"));
        assert!(!dir.out_dir.exists());
    }
}
