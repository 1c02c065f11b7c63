// src/exec/backend.rs

//! Pluggable remote-execution collaborators.
//!
//! The scheduler never talks to a cloud SDK directly. It talks to:
//!
//! - [`RemoteJobLauncher`]: fire-and-forget start of one unit; completion is
//!   observed later through a [`SignalStore`](super::SignalStore).
//! - [`TaskRuntime`]: start one unit and block until the platform reports
//!   that it stopped.
//!
//! `ProcessLauncher` / `ProcessTaskRuntime` in [`super::process`] are the
//! production implementations shipped with the binary; tests provide fakes
//! that don't spawn real processes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::context::EnvVars;
use crate::dispatch::TestUnit;

/// Boxed future returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstracting how a unit is started on remote compute when
/// completion is signalled out-of-band.
pub trait RemoteJobLauncher: Send + Sync {
    /// Start `unit` and return the job identifier assigned to it.
    ///
    /// Any error is a launch rejection for this unit only. An `Ok` carrying
    /// an empty identifier is a protocol violation and is handled by the
    /// throttler.
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// How a container task ended, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskExit {
    pub exit_code: Option<i32>,
}

impl TaskExit {
    /// Exit code used by `timeout(1)` inside the task.
    pub const TIMEOUT_EXIT_CODE: i32 = 124;

    pub fn timed_out(&self) -> bool {
        self.exit_code == Some(Self::TIMEOUT_EXIT_CODE)
    }
}

/// Trait abstracting a container platform that can block until a task
/// has stopped.
pub trait TaskRuntime: Send + Sync {
    /// Start `unit` and return the platform's task handle.
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Wait until the task identified by `handle` stops, for at most
    /// `max_wait`. Exceeding `max_wait` is reported as an error.
    fn wait_stopped<'a>(
        &'a self,
        handle: &'a str,
        max_wait: Duration,
    ) -> BoxFuture<'a, anyhow::Result<TaskExit>>;
}
