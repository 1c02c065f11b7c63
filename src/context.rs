// src/context.rs

//! Per-invocation run context.
//!
//! Everything that used to be process-wide (run id, execution type, resolved
//! settings, worker environment) lives in one [`RunContext`] built once in
//! [`crate::run`] and passed by reference to every component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::config::model::{ConfigFile, EnvSection, RunSection, StoreSection};
use crate::types::ExecuteOn;

/// Environment handed to every worker.
pub type EnvVars = BTreeMap<String, String>;

/// Per-job variable carrying the job id; set by the launcher.
pub const TEST_ID_VAR: &str = "TL_TEST_ID";

/// Directory process workers write result batches into.
pub const RESULTS_DIR_VAR: &str = "TL_RESULTS_DIR";

/// Scheduling knobs, already resolved from config and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub tag_filter: Option<String>,
    /// Maximum in-flight jobs; `0` means "as many as there are units".
    pub concurrency_limit: usize,
    pub per_job_timeout: Duration,
    pub overall_timeout: Duration,
    pub rerun: bool,
    pub poll_interval: Duration,
}

impl RunSettings {
    pub fn from_section(run: &RunSection) -> Self {
        Self {
            tag_filter: run.tag_filter.clone().filter(|t| !t.trim().is_empty()),
            concurrency_limit: run.concurrency_limit,
            per_job_timeout: Duration::from_secs(run.per_job_timeout_secs),
            overall_timeout: Duration::from_secs(run.overall_timeout_secs),
            rerun: run.rerun,
            poll_interval: Duration::from_secs(run.poll_interval_secs),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_section(&RunSection::default())
    }
}

/// Explicit state of one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// `{bucket}/{custom_path}/{run_id}`; markers and results live below it.
    pub run_path: String,
    pub execute_on: ExecuteOn,
    pub settings: RunSettings,
    pub env: EnvVars,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        run_path: impl Into<String>,
        execute_on: ExecuteOn,
        settings: RunSettings,
        env: EnvVars,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            run_path: run_path.into(),
            execute_on,
            settings,
            env,
        }
    }

    /// Build the context for a fresh run from validated config.
    pub fn from_config(cfg: &ConfigFile, execute_on: ExecuteOn, settings: RunSettings) -> Self {
        let run_id = new_run_id();
        Self::for_existing_run(cfg, run_id, execute_on, settings)
    }

    /// Build the context for a known run id (e.g. when only showing results).
    pub fn for_existing_run(
        cfg: &ConfigFile,
        run_id: String,
        execute_on: ExecuteOn,
        settings: RunSettings,
    ) -> Self {
        let run_path = run_path(&cfg.store.bucket, &cfg.store.custom_path, &run_id);
        let mut env = worker_env(&run_id, execute_on, &cfg.store, &cfg.env, |name| {
            std::env::var(name).ok()
        });
        env.insert(
            RESULTS_DIR_VAR.to_string(),
            results_dir(&cfg.store.root, &run_path).to_string_lossy().into_owned(),
        );
        Self::new(run_id, run_path, execute_on, settings, env)
    }
}

pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Join bucket, custom path and run id, dropping empty segments.
///
/// The result never starts with `/`, so joining it onto the store root
/// stays below the root.
pub fn run_path(bucket: &str, custom_path: &str, run_id: &str) -> String {
    [bucket, custom_path, run_id]
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `{root}/{run_path}/results`
pub fn results_dir(root: &str, run_path: &str) -> PathBuf {
    Path::new(root).join(run_path).join("results")
}

/// Environment for workers: reporter variables first, then variables
/// copied from this process, then literal values (later entries win).
pub fn worker_env<F>(
    run_id: &str,
    execute_on: ExecuteOn,
    store: &StoreSection,
    env: &EnvSection,
    lookup: F,
) -> EnvVars
where
    F: Fn(&str) -> Option<String>,
{
    let mut vars = EnvVars::new();
    vars.insert("TL_RUN_ID".to_string(), run_id.to_string());
    vars.insert("TL_EXECUTE_FROM".to_string(), execute_on.as_str().to_string());
    vars.insert("TL_RESULTS_BUCKET".to_string(), store.bucket.clone());
    vars.insert("TL_CUSTOM_RESULTS_PATH".to_string(), store.custom_path.clone());
    vars.insert("TL_RESULTS_PREFIX".to_string(), store.result_prefix.clone());

    for name in &env.passthrough {
        match lookup(name) {
            Some(value) => {
                vars.insert(name.clone(), value);
            }
            None => debug!(variable = %name, "passthrough variable not set; skipping"),
        }
    }

    for (name, value) in &env.values {
        vars.insert(name.clone(), value.clone());
    }

    vars
}
