//! Pipeline configuration stored in `agent-eval.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pipeline configuration (TOML).
///
/// Edited by humans. Missing fields fall back to defaults; CLI flags override
/// whatever is loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory that `gate` writes its reports into.
    pub output_dir: PathBuf,

    /// Regex matched against file names in the runs directory.
    pub run_file_pattern: String,

    /// How deep to walk the runs directory (1 = direct children only).
    pub run_dir_max_depth: usize,

    /// Treat run validation warnings as gate failures.
    pub fail_on_run_warnings: bool,

    /// Cap on validation issues listed in the markdown export.
    pub max_export_issues: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("eval-out"),
            run_file_pattern: r"^.*\.json$".to_string(),
            run_dir_max_depth: 1,
            fail_on_run_warnings: false,
            max_export_issues: 20,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must be non-empty"));
        }
        if self.run_dir_max_depth == 0 {
            return Err(anyhow!("run_dir_max_depth must be > 0"));
        }
        if self.max_export_issues == 0 {
            return Err(anyhow!("max_export_issues must be > 0"));
        }
        self.run_file_regex()?;
        Ok(())
    }

    pub fn run_file_regex(&self) -> Result<Regex> {
        Regex::new(&self.run_file_pattern)
            .with_context(|| format!("run_file_pattern '{}' is not a valid regex", self.run_file_pattern))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn hand_written_file_overrides_every_field() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent-eval.toml");
        fs::write(
            &path,
            r#"output_dir = "reports"
run_file_pattern = '^run-.*\.json$'
run_dir_max_depth = 3
fail_on_run_warnings = true
max_export_issues = 5
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(
            cfg,
            PipelineConfig {
                output_dir: PathBuf::from("reports"),
                run_file_pattern: r"^run-.*\.json$".to_string(),
                run_dir_max_depth: 3,
                fail_on_run_warnings: true,
                max_export_issues: 5,
            }
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent-eval.toml");
        fs::write(&path, "output_dir = \"reports\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.output_dir, PathBuf::from("reports"));
        assert_eq!(cfg.run_dir_max_depth, 1);
        assert_eq!(cfg.max_export_issues, 20);
    }

    #[test]
    fn rejects_bad_pattern() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent-eval.toml");
        fs::write(&path, "run_file_pattern = \"(unclosed\"\n").expect("write");
        let err = load_config(&path).expect_err("bad regex");
        assert!(format!("{err:#}").contains("run_file_pattern"));
    }
}
