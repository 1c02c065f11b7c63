// src/results/store.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::exec::BoxFuture;
use crate::fs::FileSystem;

use super::TestResult;

/// Source of result batches for one run.
pub trait ResultStore: Send + Sync {
    /// File names of all batches (any prefix; the reconciler filters).
    fn batch_names(&self) -> BoxFuture<'_, anyhow::Result<Vec<String>>>;

    fn read_batch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<TestResult>>>;
}

/// `{prefix}-{unix_millis}.json`
pub fn batch_file_name(prefix: &str, unix_millis: u64) -> String {
    format!("{prefix}-{unix_millis}.json")
}

/// Timestamp embedded in a batch file name, if the name belongs to `prefix`.
pub fn parse_batch_timestamp(name: &str, prefix: &str) -> Option<u64> {
    name.strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Batches stored as JSON files in a local directory
/// (`{root}/{run_path}/results`).
#[derive(Debug, Clone)]
pub struct DirResultStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl DirResultStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    /// Results directory of a run below the store root.
    pub fn for_run(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, run_path: &str) -> Self {
        let dir = root.into().join(run_path).join("results");
        Self::new(fs, dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultStore for DirResultStore {
    fn batch_names(&self) -> BoxFuture<'_, anyhow::Result<Vec<String>>> {
        Box::pin(async move {
            let entries = self
                .fs
                .read_dir(&self.dir)
                .with_context(|| format!("listing result batches in {:?}", self.dir))?;
            Ok(entries
                .into_iter()
                .filter(|path| self.fs.is_file(path))
                .filter_map(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .map(str::to_string)
                })
                .collect())
        })
    }

    fn read_batch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<TestResult>>> {
        Box::pin(async move {
            let path = self.dir.join(name);
            let text = self.fs.read_to_string(&path)?;
            let results: Vec<TestResult> = serde_json::from_str(&text)
                .with_context(|| format!("parsing result batch {:?}", path))?;
            Ok(results)
        })
    }
}
