//! Test-only builders for manifests, runs, and in-memory collaborators.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use regex::Regex;
use serde_json::Value;

use crate::core::types::PathProbe;
use crate::experiment::{
    Condition, ExperimentManifest, PostRunReflection, RunRecord, Task, ToolCall,
};
use crate::io::document::{DocumentStore, JsonFileStore, save_as};

/// Create a task with every required field populated.
pub fn task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        title: format!("{id} title"),
        repo: "example/repo".to_string(),
        commit: "abc123".to_string(),
        acceptance_checks: vec!["dotnet test".to_string()],
        prompt_file: None,
        repo_url: None,
    }
}

pub fn condition(id: &str, tools_enabled: bool) -> Condition {
    Condition {
        id: id.to_string(),
        name: format!("{id} arm"),
        tools_enabled,
        notes: None,
    }
}

/// One task (`t1`), a `control` and a `treatment` arm, two runs per cell.
pub fn standard_manifest() -> ExperimentManifest {
    ExperimentManifest {
        experiment_id: "exp".to_string(),
        description: String::new(),
        tool_prefixes: vec!["roslyn".to_string()],
        conditions: vec![condition("control", false), condition("treatment", true)],
        tasks: vec![task("t1")],
        runs_per_cell: 2,
    }
}

/// Create a failed run with no tools and no replicate.
pub fn run(run_id: &str, task_id: &str, condition_id: &str) -> RunRecord {
    RunRecord {
        run_id: run_id.to_string(),
        task_id: task_id.to_string(),
        condition_id: condition_id.to_string(),
        replicate: None,
        agent: "agent".to_string(),
        model: "model".to_string(),
        succeeded: false,
        compile_passed: false,
        tests_passed: false,
        duration_seconds: 1.0,
        tools_offered: Vec::new(),
        tool_calls: Vec::new(),
        token_usage: None,
        post_run_reflection: None,
    }
}

/// Create a run that offered `offered` and successfully called `called`.
pub fn run_with_tools(
    run_id: &str,
    task_id: &str,
    condition_id: &str,
    offered: &[&str],
    called: &[&str],
) -> RunRecord {
    RunRecord {
        tools_offered: offered.iter().map(|name| name.to_string()).collect(),
        tool_calls: called
            .iter()
            .map(|name| ToolCall {
                tool_name: name.to_string(),
                ok: true,
            })
            .collect(),
        ..run(run_id, task_id, condition_id)
    }
}

/// Create a run carrying a reflection with the given helpfulness score.
///
/// Treatment runs offer and call a `roslyn` tool so only the score is under test.
pub fn run_with_score(
    run_id: &str,
    task_id: &str,
    condition_id: &str,
    score: Option<i64>,
) -> RunRecord {
    let mut record = run_with_tools(
        run_id,
        task_id,
        condition_id,
        &["roslyn_find"],
        &["roslyn_find"],
    );
    record.post_run_reflection = Some(PostRunReflection {
        summary: "reflection".to_string(),
        roslyn_helpfulness_score: score,
        ..PostRunReflection::default()
    });
    record
}

/// Probe answering from a fixed set of paths.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    paths: BTreeSet<PathBuf>,
}

impl FixedProbe {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl PathProbe for FixedProbe {
    fn exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

/// In-memory document store keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<BTreeMap<PathBuf, Value>>,
}

impl MemoryStore {
    pub fn insert(&self, path: impl Into<PathBuf>, document: Value) {
        self.documents.borrow_mut().insert(path.into(), document);
    }

    pub fn get(&self, path: &Path) -> Option<Value> {
        self.documents.borrow().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.documents.borrow().keys().cloned().collect()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, path: &Path) -> Result<Value> {
        self.get(path)
            .ok_or_else(|| anyhow!("read {}: not found", path.display()))
    }

    fn load_all(&self, dir: &Path, pattern: &Regex) -> Result<Vec<(PathBuf, Value)>> {
        let documents = self.documents.borrow();
        let matches: Vec<(PathBuf, Value)> = documents
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter(|(path, _)| {
                path.file_name()
                    .is_some_and(|name| pattern.is_match(&name.to_string_lossy()))
            })
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect();
        if matches.is_empty() && !documents.keys().any(|path| path.starts_with(dir)) {
            return Err(anyhow!("directory not found: {}", dir.display()));
        }
        Ok(matches)
    }

    fn save(&self, path: &Path, document: &Value) -> Result<()> {
        self.insert(path, document.clone());
        Ok(())
    }
}

impl PathProbe for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.documents.borrow().contains_key(path)
    }
}

/// Scratch experiment layout: `manifest.json` plus a `runs/` directory.
pub struct ExperimentDir {
    pub temp: tempfile::TempDir,
    pub manifest_path: PathBuf,
    pub runs_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl ExperimentDir {
    pub fn new(manifest: &ExperimentManifest) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let manifest_path = temp.path().join("manifest.json");
        let runs_dir = temp.path().join("runs");
        let out_dir = temp.path().join("out");
        std::fs::create_dir_all(&runs_dir)?;
        save_as(&JsonFileStore::default(), &manifest_path, manifest)?;
        Ok(Self {
            temp,
            manifest_path,
            runs_dir,
            out_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write `runs/<run_id>.json`.
    pub fn add_run(&self, record: &RunRecord) -> Result<PathBuf> {
        let path = self.runs_dir.join(format!("{}.json", record.run_id));
        save_as(&JsonFileStore::default(), &path, record)?;
        Ok(path)
    }
}
