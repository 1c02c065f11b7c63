// src/exec/signal.rs

//! Completion markers written by workers when a job finishes.

use std::path::PathBuf;

use anyhow::Context;

use super::backend::BoxFuture;

/// Key of the completion marker for `job_id` within a run.
pub fn completion_marker_key(run_path: &str, job_id: &str) -> String {
    format!("{run_path}/{job_id}/test.complete")
}

/// Shared store that workers write completion markers into.
pub trait SignalStore: Send + Sync {
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<bool>>;
}

/// Signal store backed by a local directory (a synced mirror of the
/// object store, or the directory process workers write into directly).
#[derive(Debug, Clone)]
pub struct DirSignalStore {
    root: PathBuf,
}

impl DirSignalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn marker_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl SignalStore for DirSignalStore {
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<bool>> {
        let path = self.marker_path(key);
        Box::pin(async move {
            tokio::fs::try_exists(&path)
                .await
                .with_context(|| format!("checking completion marker {:?}", path))
        })
    }
}
