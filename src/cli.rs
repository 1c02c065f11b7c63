// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::ExecuteOn;

/// Command-line arguments for `testdispatch`.
///
/// Flags override the matching keys of the config file.
#[derive(Debug, Clone, Parser, Default)]
#[command(
    name = "testdispatch",
    version,
    about = "Dispatch end-to-end test files to remote workers with bounded concurrency.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Dispatch.toml` in the current working directory; a missing
    /// default file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Where to run tests: local, function or container.
    #[arg(long, value_name = "BACKEND")]
    pub execute_on: Option<ExecuteOn>,

    /// Test folder or single test file.
    #[arg(long, value_name = "PATH")]
    pub spec: Option<String>,

    /// Tag expression, e.g. "@smoke and not @flaky".
    #[arg(long, value_name = "EXPR")]
    pub filter_by_tag: Option<String>,

    /// Maximum concurrent jobs (0 = all at once).
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Per-job timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub job_timeout: Option<u64>,

    /// Rerun failed and timed out tests once.
    #[arg(long)]
    pub rerun: bool,

    /// Dispatch every scenario as its own unit.
    #[arg(long)]
    pub slice_scenarios: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TESTDISPATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config and list eligible test files without dispatching.
    #[arg(long)]
    pub dry_run: bool,

    /// Reconcile and print the results of an earlier run.
    #[arg(long, value_name = "RUN_ID")]
    pub show_results: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
