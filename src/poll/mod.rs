// src/poll/mod.rs

//! Completion polling for the function backend.

pub mod clock;
pub mod poller;

pub use clock::{Clock, TokioClock};
pub use poller::CompletionPoller;
