// src/dispatch/limiter.rs

//! Push-based admission: a semaphore bounds how many units are between
//! launch and "task stopped" at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::{EnvVars, RunContext};
use crate::errors::{DispatchError, Result};
use crate::exec::{BoxFuture, TaskRuntime};
use crate::poll::Clock;

use super::job::{Job, JobState, TestUnit};
use super::slots::SlotPool;
use super::{LaunchFailure, PassReport, PassRunner};

/// Per-unit result of launch-then-wait.
#[derive(Debug)]
enum Awaited {
    Finished(Job),
    Rejected(LaunchFailure),
    Malformed { unit: TestUnit, id: String },
}

/// Tracks current and peak number of units holding a permit.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Container backend: each unit is launched and awaited individually.
pub struct AwaitedDispatcher<R, C> {
    runtime: Arc<R>,
    clock: C,
    wait_max: Duration,
}

impl<R, C> AwaitedDispatcher<R, C>
where
    R: TaskRuntime + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(runtime: Arc<R>, clock: C, wait_max: Duration) -> Self {
        Self {
            runtime,
            clock,
            wait_max,
        }
    }

    async fn drive(&self, units: Vec<TestUnit>, ctx: &RunContext) -> Result<PassReport> {
        let mut report = PassReport::default();
        if units.is_empty() {
            return Ok(report);
        }

        let capacity = SlotPool::capacity_for(ctx.settings.concurrency_limit, units.len());
        let semaphore = Arc::new(Semaphore::new(capacity));
        let in_flight = Arc::new(InFlight::default());
        let env = Arc::new(ctx.env.clone());
        let mut finished = vec![false; units.len()];
        let mut set: JoinSet<(usize, Awaited)> = JoinSet::new();

        info!(units = units.len(), capacity, "dispatching units to task runtime");

        let mut deadline = self.clock.sleep(ctx.settings.overall_timeout);

        let mut next = 0;
        loop {
            let has_backlog = next < units.len();

            tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned(), if has_backlog => {
                    let Ok(permit) = permit else { break };
                    let unit = units[next].clone();
                    let index = next;
                    next += 1;
                    report.admitted += 1;

                    let runtime = Arc::clone(&self.runtime);
                    let clock = self.clock.clone();
                    let env = Arc::clone(&env);
                    let in_flight = Arc::clone(&in_flight);
                    let wait_max = self.wait_max;

                    set.spawn(async move {
                        in_flight.enter();
                        let outcome = launch_and_wait(&*runtime, &clock, unit, &env, wait_max).await;
                        in_flight.leave();
                        drop(permit);
                        (index, outcome)
                    });
                }
                joined = set.join_next(), if !set.is_empty() => {
                    let Some(joined) = joined else { continue };
                    let (index, outcome) = joined.map_err(anyhow::Error::from)?;
                    finished[index] = true;
                    match outcome {
                        Awaited::Finished(job) if job.state == JobState::TimedOut => {
                            report.timed_out.push(job)
                        }
                        Awaited::Finished(job) => report.completed.push(job),
                        Awaited::Rejected(failure) => report.launch_failures.push(failure),
                        Awaited::Malformed { unit, id } => {
                            set.abort_all();
                            return Err(DispatchError::LaunchProtocolError { unit: unit.path, id });
                        }
                    }
                }
                _ = &mut deadline => {
                    let secs = ctx.settings.overall_timeout.as_secs();
                    error!(error = %DispatchError::GlobalTimeout(secs), "aborting pass");
                    set.abort_all();
                    report.deadline_exceeded = true;
                    report.abandoned = units
                        .iter()
                        .zip(finished.iter())
                        .filter(|(_, done)| !**done)
                        .map(|(unit, _)| unit.clone())
                        .collect();
                    break;
                }
            }

            if next >= units.len() && set.is_empty() {
                break;
            }
        }

        report.peak_in_flight = in_flight.peak.load(Ordering::SeqCst);
        Ok(report)
    }
}

async fn launch_and_wait<R, C>(
    runtime: &R,
    clock: &C,
    unit: TestUnit,
    env: &EnvVars,
    wait_max: Duration,
) -> Awaited
where
    R: TaskRuntime + ?Sized,
    C: Clock + ?Sized,
{
    let handle = match runtime.launch(&unit, env).await {
        Ok(handle) if handle.trim().is_empty() => {
            return Awaited::Malformed { unit, id: handle };
        }
        Ok(handle) => handle,
        Err(err) => {
            let failure = LaunchFailure {
                reason: format!("{err:#}"),
                unit,
            };
            warn!(error = %failure.as_error(), "task launch rejected");
            return Awaited::Rejected(failure);
        }
    };

    let mut job = Job::running(handle, unit, clock.now());
    debug!(job_id = %job.id, unit = %job.unit.path, "task started; waiting for it to stop");

    match runtime.wait_stopped(&job.id, wait_max).await {
        Ok(exit) if exit.timed_out() => {
            warn!(job_id = %job.id, unit = %job.unit.path, "task reported a timeout");
            job.finish(JobState::TimedOut);
        }
        Ok(exit) => {
            debug!(job_id = %job.id, exit_code = ?exit.exit_code, "task stopped");
            job.finish(JobState::Completed);
        }
        Err(err) => {
            warn!(
                job_id = %job.id,
                unit = %job.unit.path,
                error = %format!("{err:#}"),
                "waiting for task failed; recording as timed out"
            );
            job.finish(JobState::TimedOut);
        }
    }
    Awaited::Finished(job)
}

impl<R, C> PassRunner for AwaitedDispatcher<R, C>
where
    R: TaskRuntime + 'static,
    C: Clock + Clone + 'static,
{
    fn run_pass<'a>(
        &'a self,
        units: Vec<TestUnit>,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<PassReport>> {
        Box::pin(self.drive(units, ctx))
    }
}
