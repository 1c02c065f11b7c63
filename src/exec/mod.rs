// src/exec/mod.rs

//! Execution layer: the collaborators the scheduler dispatches through.
//!
//! - [`backend`] defines `RemoteJobLauncher` and `TaskRuntime`.
//! - [`signal`] defines the `SignalStore` used to detect completion.
//! - [`process`] holds process-backed implementations used by the binary.
//! - [`local`] runs a whole suite as one subprocess.

pub mod backend;
pub mod local;
pub mod process;
pub mod signal;

pub use backend::{BoxFuture, RemoteJobLauncher, TaskExit, TaskRuntime};
pub use process::{CommandTemplate, ProcessLauncher, ProcessTaskRuntime};
pub use signal::{completion_marker_key, DirSignalStore, SignalStore};
