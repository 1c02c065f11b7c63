// src/rerun/mod.rs

//! First pass, optional rerun of what failed, and the final verdict.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::dispatch::{Job, LaunchFailure, PassReport, PassRunner, TestUnit};
use crate::errors::{DispatchError, Result};
use crate::fs::FileSystem;
use crate::results::{ResultReconciler, ResultStore, TestResult, TestStatus};
use crate::tags::filter_units;

/// Final outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct RunVerdict {
    pub failed: Vec<TestResult>,
    pub timed_out: Vec<Job>,
    pub launch_failures: Vec<LaunchFailure>,
    /// Rerun candidates the tag filter no longer admitted.
    pub unresolved: Vec<TestUnit>,
    /// Results that timed-out jobs wrote anyway.
    pub late_results: Vec<TestResult>,
    pub global_timeout: bool,
    pub exit_code: i32,
    pub first_pass: Option<PassReport>,
    pub rerun_pass: Option<PassReport>,
}

impl RunVerdict {
    fn settle(mut self) -> Self {
        let failing = !self.failed.is_empty()
            || !self.timed_out.is_empty()
            || !self.launch_failures.is_empty()
            || !self.unresolved.is_empty()
            || self.global_timeout;
        self.exit_code = i32::from(failing);
        self
    }
}

pub struct RerunController<P, S> {
    runner: P,
    reconciler: ResultReconciler<S>,
    fs: Arc<dyn FileSystem>,
}

impl<P, S> RerunController<P, S>
where
    P: PassRunner,
    S: ResultStore,
{
    pub fn new(runner: P, reconciler: ResultReconciler<S>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            runner,
            reconciler,
            fs,
        }
    }

    /// Filter `discovered`, run it, and rerun failures once if enabled.
    pub async fn run(&self, discovered: Vec<TestUnit>, ctx: &RunContext) -> Result<RunVerdict> {
        let tag_filter = ctx.settings.tag_filter.as_deref();
        let eligible = filter_units(self.fs.as_ref(), discovered, tag_filter);

        let first = self.runner.run_pass(eligible, ctx).await?;

        if first.deadline_exceeded {
            let err = DispatchError::GlobalTimeout(ctx.settings.overall_timeout.as_secs());
            warn!(error = %err, "skipping rerun after global timeout");
            return Ok(self.verdict_from_pass(first, false).await);
        }

        let failed = self.reconciler.per_state(TestStatus::Failed).await;
        let needs_rerun =
            !failed.is_empty() || !first.timed_out.is_empty() || !first.launch_failures.is_empty();

        if !ctx.settings.rerun || !needs_rerun {
            return Ok(self.verdict_from_pass(first, false).await);
        }

        let candidates = rerun_set(&first, &failed);
        info!(
            units = candidates.len(),
            files = ?candidates.iter().map(|u| u.path.as_str()).collect::<Vec<_>>(),
            "rerunning failed and timed out tests"
        );

        let rerun_units = filter_units(self.fs.as_ref(), candidates.clone(), tag_filter);
        let unresolved: Vec<TestUnit> = candidates
            .into_iter()
            .filter(|unit| !rerun_units.contains(unit))
            .collect();
        if !unresolved.is_empty() {
            warn!(
                count = unresolved.len(),
                "some rerun candidates were not eligible and stay failed"
            );
        }

        let second = self.runner.run_pass(rerun_units, ctx).await?;
        let mut verdict = self.verdict_from_pass(second, true).await;
        verdict.unresolved = unresolved;
        verdict.first_pass = Some(first);
        Ok(verdict.settle())
    }

    /// Verdict for results already in the store, without dispatching.
    pub async fn reconcile_only(&self, rerun: bool) -> RunVerdict {
        let failed = if rerun {
            failed_only(self.reconciler.all_once_by_identity().await)
        } else {
            self.reconciler.per_state(TestStatus::Failed).await
        };
        RunVerdict {
            failed,
            ..RunVerdict::default()
        }
        .settle()
    }

    async fn verdict_from_pass(&self, pass: PassReport, rerun: bool) -> RunVerdict {
        let failed = if rerun {
            failed_only(self.reconciler.once_by_identity_among(&pass.job_ids()).await)
        } else {
            self.reconciler.per_state(TestStatus::Failed).await
        };
        let timed_out_ids: Vec<String> = pass.timed_out.iter().map(|job| job.id.clone()).collect();
        let late_results = self.reconciler.by_ids(&timed_out_ids).await;

        let verdict = RunVerdict {
            failed,
            timed_out: pass.timed_out.clone(),
            launch_failures: pass.launch_failures.clone(),
            late_results,
            global_timeout: pass.deadline_exceeded,
            ..RunVerdict::default()
        };
        let (first_pass, rerun_pass) = if rerun {
            (None, Some(pass))
        } else {
            (Some(pass), None)
        };
        RunVerdict {
            first_pass,
            rerun_pass,
            ..verdict
        }
        .settle()
    }
}

fn failed_only(results: Vec<TestResult>) -> Vec<TestResult> {
    results.into_iter().filter(TestResult::is_failed).collect()
}

/// Timed-out units, rejected launches and failed test files, deduplicated
/// by path.
///
/// Workers may report `path_to_test` relative to where the unit lives (for
/// example without the slice directory). A reported path is mapped back to
/// every unit of the pass whose path ends with it; a path no unit ends with
/// is taken as is.
pub fn rerun_set(pass: &PassReport, failed: &[TestResult]) -> Vec<TestUnit> {
    let dispatched: Vec<&str> = pass
        .completed
        .iter()
        .chain(pass.timed_out.iter())
        .map(|job| job.unit.path.as_str())
        .chain(pass.launch_failures.iter().map(|f| f.unit.path.as_str()))
        .collect();

    let mut paths: BTreeSet<&str> = pass
        .timed_out
        .iter()
        .map(|job| job.unit.path.as_str())
        .chain(pass.launch_failures.iter().map(|f| f.unit.path.as_str()))
        .collect();

    for result in failed {
        let reported = result.path_to_test.as_str();
        if dispatched.contains(&reported) {
            paths.insert(reported);
            continue;
        }
        let matches: Vec<&str> = dispatched
            .iter()
            .copied()
            .filter(|unit| !reported.is_empty() && Path::new(unit).ends_with(reported))
            .collect();
        if matches.is_empty() {
            paths.insert(reported);
        } else {
            debug!(reported, units = ?matches, "mapped reported test path to dispatched units");
            paths.extend(matches);
        }
    }

    paths.into_iter().map(TestUnit::new).collect()
}
