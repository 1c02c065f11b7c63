// src/exec/process.rs

//! Process-backed implementations of the execution collaborators.
//!
//! These run each unit as a local shell command built from a template, so
//! the scheduler can be exercised end to end without a cloud account. The
//! command sees the worker environment plus `TL_TEST_ID`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{EnvVars, TEST_ID_VAR};
use crate::dispatch::TestUnit;
use crate::fs::FileSystem;

use super::backend::{BoxFuture, RemoteJobLauncher, TaskExit, TaskRuntime};
use super::signal::{completion_marker_key, DirSignalStore};

/// Shell command with `%TEST_FILE` / `%TEST_FILENAME` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
}

impl CommandTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute the unit's path and bare file name.
    pub fn render(&self, unit: &TestUnit) -> String {
        // FILENAME first: `%TEST_FILE` is a prefix of it.
        self.raw
            .replace("%TEST_FILENAME", unit.file_name())
            .replace("%TEST_FILE", &unit.path)
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

fn spawn_worker(line: &str, env: &EnvVars, job_id: &str) -> Result<Child> {
    let mut cmd = shell_command(line);
    cmd.envs(env)
        .env(TEST_ID_VAR, job_id)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Local timeouts never cancel remote work.
        .kill_on_drop(false);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning worker process for job '{job_id}'"))?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, job_id.to_string(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, job_id.to_string(), "stderr");
    }

    Ok(child)
}

/// Always consume worker output so pipes don't fill; log at debug.
fn forward_lines<R>(stream: R, job_id: String, stream_name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job_id = %job_id, stream = stream_name, "{}", line);
        }
    });
}

/// Function-style backend: one detached worker process per unit.
///
/// When the worker exits, the launcher writes the completion marker on its
/// behalf, which is what a remote worker would do at the end of its run.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    template: CommandTemplate,
    run_path: String,
    signals: DirSignalStore,
    fs: Arc<dyn FileSystem>,
}

impl ProcessLauncher {
    pub fn new(
        template: CommandTemplate,
        run_path: impl Into<String>,
        signals: DirSignalStore,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            template,
            run_path: run_path.into(),
            signals,
            fs,
        }
    }

    fn marker_path(&self, job_id: &str) -> PathBuf {
        self.signals
            .marker_path(&completion_marker_key(&self.run_path, job_id))
    }
}

impl RemoteJobLauncher for ProcessLauncher {
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let job_id = Uuid::new_v4().to_string();
            let line = self.template.render(unit);
            info!(unit = %unit.path, job_id = %job_id, cmd = %line, "starting worker process");

            let mut child = spawn_worker(&line, env, &job_id)?;
            let marker = self.marker_path(&job_id);
            let fs = Arc::clone(&self.fs);
            let id = job_id.clone();

            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => info!(
                        job_id = %id,
                        exit_code = status.code().unwrap_or(-1),
                        success = status.success(),
                        "worker process exited"
                    ),
                    Err(err) => warn!(job_id = %id, error = %err, "waiting for worker process failed"),
                }
                if let Err(err) = fs.write(&marker, b"") {
                    warn!(job_id = %id, error = %err, "failed to write completion marker");
                }
            });

            Ok(job_id)
        })
    }
}

/// Container-style backend: one process per unit, awaited until it stops.
#[derive(Debug)]
pub struct ProcessTaskRuntime {
    template: CommandTemplate,
    running: Mutex<HashMap<String, Child>>,
}

impl ProcessTaskRuntime {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            running: Mutex::new(HashMap::new()),
        }
    }

    fn take_child(&self, handle: &str) -> Result<Child> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| anyhow!("task table lock poisoned"))?;
        running
            .remove(handle)
            .ok_or_else(|| anyhow!("unknown task handle '{handle}'"))
    }
}

impl TaskRuntime for ProcessTaskRuntime {
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let handle = Uuid::new_v4().to_string();
            let line = self.template.render(unit);
            info!(unit = %unit.path, task = %handle, cmd = %line, "starting task process");

            let child = spawn_worker(&line, env, &handle)?;
            self.running
                .lock()
                .map_err(|_| anyhow!("task table lock poisoned"))?
                .insert(handle.clone(), child);
            Ok(handle)
        })
    }

    fn wait_stopped<'a>(
        &'a self,
        handle: &'a str,
        max_wait: Duration,
    ) -> BoxFuture<'a, Result<TaskExit>> {
        Box::pin(async move {
            let mut child = self.take_child(handle)?;
            match tokio::time::timeout(max_wait, child.wait()).await {
                Ok(status) => {
                    let status =
                        status.with_context(|| format!("waiting for task process '{handle}'"))?;
                    Ok(TaskExit {
                        exit_code: status.code(),
                    })
                }
                Err(_) => bail!("task '{handle}' still running after {max_wait:?}"),
            }
        })
    }
}
