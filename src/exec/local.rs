// src/exec/local.rs

//! Single-process local execution: the whole suite in one subprocess.

use std::process::Stdio;

use anyhow::{Context, Result};
use tracing::info;

use crate::context::EnvVars;

use super::process::shell_command;

/// Run `line` with inherited stdio and the worker environment, returning
/// the process exit code (`-1` when killed by a signal).
pub async fn run_local_suite(line: &str, env: &EnvVars) -> Result<i32> {
    info!(cmd = %line, "executing test suite locally");

    let mut cmd = shell_command(line);
    cmd.envs(env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let status = cmd
        .spawn()
        .context("spawning local test process")?
        .wait()
        .await
        .context("waiting for local test process")?;

    let code = status.code().unwrap_or(-1);
    info!(exit_code = code, success = status.success(), "local test process exited");
    Ok(code)
}
