// src/dispatch/mod.rs

//! Bounded-concurrency dispatch.
//!
//! Two backends drain a backlog under the same contract (at most
//! `capacity` jobs running, every unit admitted exactly once):
//!
//! - [`crate::poll::CompletionPoller`] pulls units through a
//!   [`DispatchThrottler`] on every poll tick (function backend).
//! - [`AwaitedDispatcher`] pushes units through a semaphore and awaits each
//!   task's native completion (container backend).
//!
//! Both implement [`PassRunner`], which is all the rerun controller sees.

pub mod job;
pub mod limiter;
pub mod slots;
pub mod throttler;

pub use job::{Job, JobId, JobState, TestUnit};
pub use limiter::AwaitedDispatcher;
pub use slots::{Backlog, SlotPool};
pub use throttler::{DispatchThrottler, Wave};

use crate::context::RunContext;
use crate::errors::{DispatchError, Result};
use crate::exec::BoxFuture;

/// A unit whose launch was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchFailure {
    pub unit: TestUnit,
    pub reason: String,
}

impl LaunchFailure {
    pub fn as_error(&self) -> DispatchError {
        DispatchError::LaunchError {
            unit: self.unit.path.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Everything one scheduling pass produced.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub completed: Vec<Job>,
    pub timed_out: Vec<Job>,
    pub launch_failures: Vec<LaunchFailure>,
    /// Units without a terminal state when the run deadline hit
    /// (in flight or never dispatched).
    pub abandoned: Vec<TestUnit>,
    pub deadline_exceeded: bool,
    /// Units taken off the backlog, launched or rejected.
    pub admitted: usize,
    pub peak_in_flight: usize,
}

impl PassReport {
    /// Ids of every job that reached a terminal state.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.completed
            .iter()
            .chain(self.timed_out.iter())
            .map(|job| job.id.clone())
            .collect()
    }
}

/// Runs one pass over a list of eligible units.
pub trait PassRunner: Send + Sync {
    fn run_pass<'a>(
        &'a self,
        units: Vec<TestUnit>,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<PassReport>>;
}
