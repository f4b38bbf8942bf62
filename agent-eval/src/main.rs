//! Agent evaluation pipeline CLI.
//!
//! Every subcommand prints one `key=value` summary line to stdout and writes
//! its report as JSON (or markdown for `export`).

use std::path::PathBuf;

use agent_eval::cancel::{CancelToken, cancel_on_ctrl_c};
use agent_eval::exit_codes;
use agent_eval::export::export_summary;
use agent_eval::gate::{
    GATE_REPORT_FILE, GateOptions, MANIFEST_VALIDATION_FILE, RUN_VALIDATION_FILE, SCORE_FILE,
    SUMMARY_FILE, run_gate,
};
use agent_eval::io::config::{PipelineConfig, load_config};
use agent_eval::io::document::JsonFileStore;
use agent_eval::io::manifest_store::load_manifest;
use agent_eval::io::probe::FsProbe;
use agent_eval::io::run_store::load_runs;
use agent_eval::logging;
use agent_eval::score::score_runs;
use agent_eval::validate::{validate_manifest, validate_runs};
use agent_eval::worklist::{WORKLIST_FILE, materialize_templates, plan_worklist};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "agent-eval",
    version,
    about = "Validate, score, and gate agent tool-usage experiments"
)]
struct Cli {
    /// Pipeline config (TOML). Defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "agent-eval.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check manifest completeness and consistency.
    ValidateManifest {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check run records against the manifest.
    ValidateRuns {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        runs: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Aggregate per-condition metrics and control-vs-treatment comparisons.
    Score {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        runs: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List missing runs per (task, condition) cell.
    Worklist {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        runs: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write draft run documents for every pending run.
    Templates {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        runs: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        /// Overwrite existing draft files.
        #[arg(short, long)]
        force: bool,
    },
    /// Render a markdown summary from score and run validation reports.
    Export {
        #[arg(long)]
        score: PathBuf,
        #[arg(long)]
        run_validation: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run every stage and decide pass/fail.
    Gate {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        runs: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Fail the gate when run validation reports any warning.
        #[arg(long)]
        fail_on_run_warnings: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FATAL);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let store = JsonFileStore::new(cfg.run_dir_max_depth);
    let default_out = |name: &str| cfg.output_dir.join(name);

    match cli.command {
        Command::ValidateManifest { manifest, out } => {
            let loaded = load_manifest(&store, &manifest)?;
            let out = out.unwrap_or_else(|| default_out(MANIFEST_VALIDATION_FILE));
            let report = validate_manifest(&store, &FsProbe, &loaded, &out)?;
            println!(
                "valid={} errors={} warnings={} report={}",
                report.valid,
                report.error_count,
                report.warning_count,
                out.display()
            );
            Ok(valid_code(report.valid))
        }
        Command::ValidateRuns {
            manifest,
            runs,
            out,
        } => {
            let loaded = load_manifest(&store, &manifest)?;
            let records = load_runs(&store, &runs, &cfg.run_file_regex()?)?;
            let out = out.unwrap_or_else(|| default_out(RUN_VALIDATION_FILE));
            let report = validate_runs(&store, &loaded.manifest, &records, &out)?;
            let validation = &report.validation;
            println!(
                "valid={} runs={} errors={} warnings={} report={}",
                validation.valid,
                validation.total_runs,
                validation.error_count,
                validation.warning_count,
                out.display()
            );
            Ok(valid_code(validation.valid))
        }
        Command::Score {
            manifest,
            runs,
            out,
        } => {
            let loaded = load_manifest(&store, &manifest)?;
            let records = load_runs(&store, &runs, &cfg.run_file_regex()?)?;
            let out = out.unwrap_or_else(|| default_out(SCORE_FILE));
            let report = score_runs(&store, &loaded, &records, &out)?;
            println!(
                "sufficient_data={} runs={} report={}",
                report.sufficient_data,
                report.total_runs,
                out.display()
            );
            Ok(exit_codes::OK)
        }
        Command::Worklist {
            manifest,
            runs,
            out,
        } => {
            let loaded = load_manifest(&store, &manifest)?;
            let records = load_runs(&store, &runs, &cfg.run_file_regex()?)?;
            let out = out.unwrap_or_else(|| default_out(WORKLIST_FILE));
            let report = plan_worklist(&store, &loaded.manifest, &records, &out)?;
            println!(
                "expected={} observed={} pending={} report={}",
                report.worklist.expected_runs,
                report.worklist.observed_runs,
                report.worklist.pending_runs.len(),
                out.display()
            );
            Ok(exit_codes::OK)
        }
        Command::Templates {
            manifest,
            runs,
            out_dir,
            force,
        } => {
            let loaded = load_manifest(&store, &manifest)?;
            let records = load_runs(&store, &runs, &cfg.run_file_regex()?)?;
            let outcome = materialize_templates(
                &store,
                &FsProbe,
                &loaded.manifest,
                &records,
                &out_dir,
                force,
            )?;
            println!(
                "written={} skipped={} out_dir={}",
                outcome.written.len(),
                outcome.skipped.len(),
                out_dir.display()
            );
            Ok(exit_codes::OK)
        }
        Command::Export {
            score,
            run_validation,
            out,
        } => {
            let out = out.unwrap_or_else(|| default_out(SUMMARY_FILE));
            export_summary(&store, &score, &run_validation, cfg.max_export_issues, &out)?;
            println!("summary={}", out.display());
            Ok(exit_codes::OK)
        }
        Command::Gate {
            manifest,
            runs,
            out_dir,
            fail_on_run_warnings,
        } => {
            let options = gate_options(&cfg, manifest, runs, out_dir, fail_on_run_warnings)?;
            let cancel = CancelToken::new();
            cancel_on_ctrl_c(&cancel)?;
            let report = run_gate(&store, &FsProbe, &options, &cancel)?;
            println!(
                "gate_passed={} notes={} report={}",
                report.gate_passed,
                report.notes.len(),
                options.out_dir.join(GATE_REPORT_FILE).display()
            );
            for note in &report.notes {
                eprintln!("{note}");
            }
            Ok(if report.gate_passed {
                exit_codes::OK
            } else {
                exit_codes::GATE_FAILED
            })
        }
    }
}

fn gate_options(
    cfg: &PipelineConfig,
    manifest: PathBuf,
    runs: PathBuf,
    out_dir: Option<PathBuf>,
    fail_on_run_warnings: bool,
) -> Result<GateOptions> {
    Ok(GateOptions {
        manifest_path: manifest,
        runs_dir: runs,
        out_dir: out_dir.unwrap_or_else(|| cfg.output_dir.clone()),
        run_file_pattern: cfg.run_file_regex()?,
        fail_on_run_warnings: fail_on_run_warnings || cfg.fail_on_run_warnings,
        max_export_issues: cfg.max_export_issues,
    })
}

fn valid_code(valid: bool) -> i32 {
    if valid {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    }
}
