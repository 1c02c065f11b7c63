// src/results/mod.rs

//! Test outcomes written by workers, and their reconciliation across
//! result batches.

pub mod reconciler;
pub mod store;

pub use reconciler::ResultReconciler;
pub use store::{batch_file_name, parse_batch_timestamp, DirResultStore, ResultStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of one test, as reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Pending,
    #[serde(other)]
    Unknown,
}

/// One entry of a result batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Id of the job that produced this result.
    pub test_id: String,
    pub title: String,
    pub path_to_test: String,
    pub status: TestStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TestResult {
    /// `(path_to_test, title)`; a rerun result supersedes an older one with
    /// the same identity.
    pub fn identity(&self) -> (&str, &str) {
        (&self.path_to_test, &self.title)
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }
}
