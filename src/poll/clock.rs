// src/poll/clock.rs

use std::time::{Duration, Instant};

use crate::exec::BoxFuture;

/// Time source for the scheduler. Tests substitute a manual clock so poll
/// ticks advance instantly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()>;
}

/// Wall-clock time and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
