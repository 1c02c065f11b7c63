// src/dispatch/job.rs

use std::path::Path;
use std::time::{Duration, Instant};

/// One discovered test file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestUnit {
    pub path: String,
}

impl TestUnit {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Last path component, or the whole path if it has none.
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }
}

impl From<&str> for TestUnit {
    fn from(path: &str) -> Self {
        TestUnit::new(path)
    }
}

/// Identifier assigned by the launcher (invocation id or task handle).
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::TimedOut)
    }
}

/// One dispatched execution attempt of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub unit: TestUnit,
    pub dispatched_at: Instant,
    pub state: JobState,
    /// Completion marker was observed, even if the job ended up `TimedOut`.
    pub marker_seen: bool,
}

impl Job {
    /// A job the launcher has just accepted.
    pub fn running(id: impl Into<JobId>, unit: TestUnit, dispatched_at: Instant) -> Self {
        Self {
            id: id.into(),
            unit,
            dispatched_at,
            state: JobState::Running,
            marker_seen: false,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.dispatched_at)
    }

    /// Move to a terminal state. Returns `false` (and changes nothing) if
    /// the job already reached one.
    pub fn finish(&mut self, state: JobState) -> bool {
        if self.state.is_terminal() || !state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }
}
