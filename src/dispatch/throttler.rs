// src/dispatch/throttler.rs

//! Pull-based admission control: fill every free slot from the backlog.

use tracing::{debug, warn};

use crate::context::EnvVars;
use crate::errors::{DispatchError, Result};
use crate::exec::RemoteJobLauncher;
use crate::poll::Clock;

use super::job::Job;
use super::slots::{Backlog, SlotPool};
use super::LaunchFailure;

/// Outcome of one admission wave.
#[derive(Debug, Default)]
pub struct Wave {
    pub launched: Vec<Job>,
    pub failed: Vec<LaunchFailure>,
}

pub struct DispatchThrottler<'a, L: ?Sized> {
    launcher: &'a L,
    env: &'a EnvVars,
}

impl<'a, L> DispatchThrottler<'a, L>
where
    L: RemoteJobLauncher + ?Sized,
{
    pub fn new(launcher: &'a L, env: &'a EnvVars) -> Self {
        Self { launcher, env }
    }

    /// Launch backlog units until the pool is full or the backlog is drained.
    ///
    /// A rejected launch consumes no slot and does not stop the wave. An
    /// accepted launch with a blank job id aborts the wave with
    /// [`DispatchError::LaunchProtocolError`].
    pub async fn admit<C>(
        &self,
        backlog: &mut Backlog,
        pool: &mut SlotPool,
        clock: &C,
    ) -> Result<Wave>
    where
        C: Clock + ?Sized,
    {
        let mut wave = Wave::default();
        debug!(
            available_slots = pool.available(),
            remaining = backlog.remaining().len(),
            "admitting units"
        );

        while pool.available() > 0 {
            let Some(unit) = backlog.next_unit() else {
                break;
            };

            match self.launcher.launch(&unit, self.env).await {
                Ok(id) if id.trim().is_empty() => {
                    return Err(DispatchError::LaunchProtocolError {
                        unit: unit.path,
                        id,
                    });
                }
                Ok(id) => {
                    pool.acquire();
                    debug!(
                        job_id = %id,
                        unit = %unit.path,
                        available_slots = pool.available(),
                        "job dispatched"
                    );
                    wave.launched.push(Job::running(id, unit, clock.now()));
                }
                Err(err) => {
                    let failure = LaunchFailure {
                        reason: format!("{err:#}"),
                        unit,
                    };
                    warn!(error = %failure.as_error(), "launch rejected; continuing with backlog");
                    wave.failed.push(failure);
                }
            }
        }

        Ok(wave)
    }
}
