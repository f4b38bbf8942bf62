//! JSON document store used for every pipeline input and report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

/// Storage for structured documents.
pub trait DocumentStore {
    /// Load one document. Missing or malformed documents are errors naming the path.
    fn load(&self, path: &Path) -> Result<Value>;

    /// Load every document under `dir` whose file name matches `pattern`,
    /// ordered by path. A missing directory is an error.
    fn load_all(&self, dir: &Path, pattern: &Regex) -> Result<Vec<(PathBuf, Value)>>;

    /// Persist a document. Readers never observe a partially written file.
    fn save(&self, path: &Path, document: &Value) -> Result<()>;
}

/// Filesystem-backed store writing pretty JSON with a trailing newline.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    max_depth: usize,
}

impl JsonFileStore {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, path: &Path) -> Result<Value> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    fn load_all(&self, dir: &Path, pattern: &Regex) -> Result<Vec<(PathBuf, Value)>> {
        if !dir.is_dir() {
            bail!("directory not found: {}", dir.display());
        }
        let mut documents = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(self.max_depth)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !pattern.is_match(&name) {
                continue;
            }
            let path = entry.into_path();
            let document = self.load(&path)?;
            documents.push((path, document));
        }
        documents.sort_by(|left, right| left.0.cmp(&right.0));
        debug!(dir = %dir.display(), count = documents.len(), "documents loaded");
        Ok(documents)
    }

    fn save(&self, path: &Path, document: &Value) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(document).context("serialize json")?;
        buf.push('\n');
        write_atomic(path, &buf)
    }
}

/// Load a document and deserialize it into `T`.
pub fn load_as<T: DeserializeOwned>(store: &dyn DocumentStore, path: &Path) -> Result<T> {
    let value = store.load(path)?;
    serde_json::from_value(value).with_context(|| format!("deserialize {}", path.display()))
}

/// Serialize `value` and save it through the store.
pub fn save_as<T: Serialize>(store: &dyn DocumentStore, path: &Path, value: &T) -> Result<()> {
    let document = serde_json::to_value(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    store.save(path, &document)
}

/// Atomically write text to disk (temp file + rename).
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
