// src/poll/poller.rs

//! Tick loop that moves in-flight jobs to `Completed` or `TimedOut`.
//!
//! Each tick, in order:
//! 1. backfill free slots from the backlog,
//! 2. check every running job for a completion marker and for its
//!    per-job timeout,
//! 3. stop if nothing is running and the backlog is drained,
//! 4. stop if the run deadline (ticks x interval) is reached,
//! 5. sleep one interval.

use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::dispatch::{
    Backlog, DispatchThrottler, Job, JobState, PassReport, PassRunner, SlotPool, TestUnit,
};
use crate::errors::{DispatchError, Result};
use crate::exec::{completion_marker_key, BoxFuture, RemoteJobLauncher, SignalStore};

use super::clock::Clock;

pub struct CompletionPoller<L, S, C> {
    launcher: L,
    signals: S,
    clock: C,
}

impl<L, S, C> CompletionPoller<L, S, C>
where
    L: RemoteJobLauncher,
    S: SignalStore,
    C: Clock,
{
    pub fn new(launcher: L, signals: S, clock: C) -> Self {
        Self {
            launcher,
            signals,
            clock,
        }
    }

    async fn drive(&self, units: Vec<TestUnit>, ctx: &RunContext) -> Result<PassReport> {
        let settings = &ctx.settings;
        let mut backlog = Backlog::new(units);
        let mut pool = SlotPool::for_backlog(settings.concurrency_limit, backlog.len());
        let throttler = DispatchThrottler::new(&self.launcher, &ctx.env);

        let mut report = PassReport::default();
        let mut in_flight: Vec<Job> = Vec::new();
        let mut ticks: u32 = 0;

        info!(
            units = backlog.len(),
            capacity = pool.capacity(),
            "starting poll loop"
        );

        loop {
            let wave = throttler.admit(&mut backlog, &mut pool, &self.clock).await?;
            report.launch_failures.extend(wave.failed);
            in_flight.extend(wave.launched);
            report.peak_in_flight = report.peak_in_flight.max(in_flight.len());

            let now = self.clock.now();
            let mut still_running = Vec::with_capacity(in_flight.len());
            for mut job in in_flight.drain(..) {
                let key = completion_marker_key(&ctx.run_path, &job.id);
                let marker = match self.signals.exists(&key).await {
                    Ok(found) => found,
                    Err(err) => {
                        let err = DispatchError::TransientPollError {
                            key,
                            reason: format!("{err:#}"),
                        };
                        warn!(job_id = %job.id, error = %err, "marker check failed; retrying next tick");
                        false
                    }
                };
                job.marker_seen = marker;

                if job.elapsed(now) >= settings.per_job_timeout {
                    warn!(
                        job_id = %job.id,
                        unit = %job.unit.path,
                        marker_seen = marker,
                        "job timed out"
                    );
                    job.finish(JobState::TimedOut);
                    pool.release();
                    report.timed_out.push(job);
                } else if marker {
                    debug!(
                        job_id = %job.id,
                        unit = %job.unit.path,
                        available_slots = pool.available() + 1,
                        "job completed"
                    );
                    job.finish(JobState::Completed);
                    pool.release();
                    report.completed.push(job);
                } else {
                    still_running.push(job);
                }
            }
            in_flight = still_running;

            if in_flight.is_empty() && backlog.is_drained() {
                break;
            }

            if settings.poll_interval.saturating_mul(ticks) >= settings.overall_timeout {
                let err = DispatchError::GlobalTimeout(settings.overall_timeout.as_secs());
                error!(
                    error = %err,
                    in_flight = in_flight.len(),
                    undispatched = backlog.remaining().len(),
                    "aborting poll loop"
                );
                report.deadline_exceeded = true;
                report.abandoned = in_flight
                    .iter()
                    .map(|job| job.unit.clone())
                    .chain(backlog.remaining().iter().cloned())
                    .collect();
                break;
            }

            debug!(
                tick = ticks,
                in_flight = in_flight.len(),
                used_slots = pool.used(),
                "waiting for completion markers"
            );
            self.clock.sleep(settings.poll_interval).await;
            ticks += 1;
        }

        report.admitted = backlog.dispatched();
        info!(
            completed = report.completed.len(),
            timed_out = report.timed_out.len(),
            launch_failures = report.launch_failures.len(),
            deadline_exceeded = report.deadline_exceeded,
            "poll loop finished"
        );
        Ok(report)
    }
}

impl<L, S, C> PassRunner for CompletionPoller<L, S, C>
where
    L: RemoteJobLauncher,
    S: SignalStore,
    C: Clock,
{
    fn run_pass<'a>(
        &'a self,
        units: Vec<TestUnit>,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<PassReport>> {
        Box::pin(self.drive(units, ctx))
    }
}
