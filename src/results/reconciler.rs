// src/results/reconciler.rs

//! Merges result batches into one view of test outcomes.
//!
//! Store errors never fail the run: a missing or unreadable results
//! directory is logged and reads as "no results".

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::errors::DispatchError;

use super::store::{parse_batch_timestamp, ResultStore};
use super::{TestResult, TestStatus};

pub struct ResultReconciler<S> {
    store: S,
    prefix: String,
}

impl<S> ResultReconciler<S>
where
    S: ResultStore,
{
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Every entry with `status`, across all batches, oldest batch first.
    /// No deduplication.
    pub async fn per_state(&self, status: TestStatus) -> Vec<TestResult> {
        self.load_batches()
            .await
            .into_iter()
            .flat_map(|(_, results)| results)
            .filter(|result| result.status == status)
            .collect()
    }

    /// One entry per `(path_to_test, title)`, taken from the newest batch
    /// that mentions it.
    pub async fn all_once_by_identity(&self) -> Vec<TestResult> {
        dedup_newest_first(self.load_batches().await, |_| true)
    }

    /// Like [`Self::all_once_by_identity`], but only entries whose `test_id`
    /// is in `ids` take part. A newer batch from another job never hides
    /// the outcome of one of `ids`.
    pub async fn once_by_identity_among(&self, ids: &[String]) -> Vec<TestResult> {
        if ids.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        dedup_newest_first(self.load_batches().await, |result| {
            wanted.contains(result.test_id.as_str())
        })
    }

    /// Every entry whose `test_id` is in `ids`. No deduplication.
    pub async fn by_ids(&self, ids: &[String]) -> Vec<TestResult> {
        if ids.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.load_batches()
            .await
            .into_iter()
            .flat_map(|(_, results)| results)
            .filter(|result| wanted.contains(result.test_id.as_str()))
            .collect()
    }

    /// Batches for this prefix in ascending timestamp order.
    async fn load_batches(&self) -> Vec<(u64, Vec<TestResult>)> {
        let names = match self.store.batch_names().await {
            Ok(names) => names,
            Err(err) => {
                let err = DispatchError::ReconciliationError(format!("{err:#}"));
                warn!(error = %err, "treating result set as empty");
                return Vec::new();
            }
        };

        let mut stamped: Vec<(u64, String)> = names
            .into_iter()
            .filter_map(|name| parse_batch_timestamp(&name, &self.prefix).map(|ts| (ts, name)))
            .collect();
        stamped.sort();

        let mut batches = Vec::with_capacity(stamped.len());
        for (timestamp, name) in stamped {
            match self.store.read_batch(&name).await {
                Ok(results) => {
                    debug!(batch = %name, entries = results.len(), "read result batch");
                    batches.push((timestamp, results));
                }
                Err(err) => {
                    let err = DispatchError::ReconciliationError(format!("{err:#}"));
                    warn!(batch = %name, error = %err, "skipping unreadable result batch");
                }
            }
        }
        batches
    }
}

fn dedup_newest_first(
    mut batches: Vec<(u64, Vec<TestResult>)>,
    keep: impl Fn(&TestResult) -> bool,
) -> Vec<TestResult> {
    batches.reverse();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut unique = Vec::new();
    for (_, results) in batches {
        for result in results.into_iter().filter(|result| keep(result)) {
            let key = (result.path_to_test.clone(), result.title.clone());
            if seen.insert(key) {
                unique.push(result);
            }
        }
    }
    unique
}
