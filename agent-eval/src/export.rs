//! Markdown summary rendered from the score and run validation reports.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::{debug, instrument};

use crate::core::types::ValidationIssue;
use crate::io::document::{DocumentStore, load_as, write_atomic};
use crate::score::ScoreReport;
use crate::validate::RunValidationReport;

const SUMMARY_TEMPLATE: &str = include_str!("templates/summary.md");

struct SummaryEngine {
    env: Environment<'static>,
}

impl SummaryEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("pct", pct);
        env.add_filter("num", num);
        env.add_filter("cell", cell);
        env.add_template("summary", SUMMARY_TEMPLATE)
            .expect("summary template should be valid");
        Self { env }
    }

    fn render(
        &self,
        score: &ScoreReport,
        runs: &RunValidationReport,
        max_issues: usize,
    ) -> Result<String> {
        let issues = top_issues(&runs.validation.issues, max_issues);
        let omitted_issues = runs.validation.issues.len() - issues.len();
        let template = self.env.get_template("summary")?;
        let rendered = template.render(context! {
            score => score,
            runs => &runs.validation,
            issues => issues,
            omitted_issues => omitted_issues,
        })?;
        Ok(rendered)
    }
}

fn pct(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.1}%", value * 100.0),
        None => "n/a".to_string(),
    }
}

fn num(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => "n/a".to_string(),
    }
}

/// Text safe inside a markdown table cell.
fn cell(value: String) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Errors before warnings, each in report order, capped at `limit`.
fn top_issues(issues: &[ValidationIssue], limit: usize) -> Vec<&ValidationIssue> {
    let (errors, warnings): (Vec<&ValidationIssue>, Vec<&ValidationIssue>) =
        issues.iter().partition(|issue| issue.is_error());
    errors.into_iter().chain(warnings).take(limit).collect()
}

pub fn render_summary(
    score: &ScoreReport,
    runs: &RunValidationReport,
    max_issues: usize,
) -> Result<String> {
    SummaryEngine::new().render(score, runs, max_issues)
}

/// Render the summary from in-memory reports and write it to `out`.
pub fn write_summary(
    score: &ScoreReport,
    runs: &RunValidationReport,
    max_issues: usize,
    out: &Path,
) -> Result<()> {
    let markdown = render_summary(score, runs, max_issues).context("render summary")?;
    write_atomic(out, &markdown)
}

/// Load both reports from disk and write the summary.
#[instrument(skip_all, fields(out = %out.display()))]
pub fn export_summary(
    store: &dyn DocumentStore,
    score_path: &Path,
    run_validation_path: &Path,
    max_issues: usize,
    out: &Path,
) -> Result<()> {
    let score: ScoreReport = load_as(store, score_path)?;
    let runs: RunValidationReport = load_as(store, run_validation_path)?;
    write_summary(&score, &runs, max_issues, out)?;
    debug!("summary exported");
    Ok(())
}
