// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::ExecuteOn;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [run]
/// execute_on = "function"
/// tag_filter = "@smoke and not @flaky"
/// concurrency_limit = 4
/// rerun = true
///
/// [store]
/// root = "./logs"
/// bucket = "e2e-results"
///
/// [backend]
/// command = "npx cypress run --browser chrome --spec %TEST_FILE"
///
/// [env]
/// passthrough = ["CI", "GITHUB_SHA"]
/// values = { BASE_URL = "https://staging.example.com" }
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub env: EnvSection,
}

/// Validated configuration. Only constructed through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub store: StoreSection,
    pub backend: BackendSection,
    pub env: EnvSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSection,
        store: StoreSection,
        backend: BackendSection,
        env: EnvSection,
    ) -> Self {
        Self {
            run,
            store,
            backend,
            env,
        }
    }
}

/// `[run]` section: what to run and how hard to throttle it.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub execute_on: ExecuteOn,

    /// Folder of test files, or a single test file.
    #[serde(default = "default_spec_path")]
    pub spec_path: String,

    /// Glob (relative to `spec_path`) selecting test files inside a folder.
    #[serde(default = "default_spec_pattern")]
    pub spec_pattern: String,

    #[serde(default)]
    pub tag_filter: Option<String>,

    /// `0` dispatches every eligible unit at once.
    #[serde(default)]
    pub concurrency_limit: usize,

    #[serde(default = "default_per_job_timeout_secs")]
    pub per_job_timeout_secs: u64,

    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,

    #[serde(default)]
    pub rerun: bool,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Split feature files into one unit per scenario before filtering.
    #[serde(default)]
    pub slice_scenarios: bool,

    /// Where scenario slices are written.
    #[serde(default = "default_slice_dir")]
    pub slice_dir: String,
}

fn default_spec_path() -> String {
    "cypress/e2e".to_string()
}

fn default_spec_pattern() -> String {
    "**/*.feature".to_string()
}

fn default_slice_dir() -> String {
    "cypress/e2e/parsed".to_string()
}

fn default_per_job_timeout_secs() -> u64 {
    120
}

fn default_overall_timeout_secs() -> u64 {
    1200
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            execute_on: ExecuteOn::default(),
            spec_path: default_spec_path(),
            spec_pattern: default_spec_pattern(),
            tag_filter: None,
            concurrency_limit: 0,
            per_job_timeout_secs: default_per_job_timeout_secs(),
            overall_timeout_secs: default_overall_timeout_secs(),
            rerun: false,
            poll_interval_secs: default_poll_interval_secs(),
            slice_scenarios: false,
            slice_dir: default_slice_dir(),
        }
    }
}

/// `[store]` section: where markers and result batches live.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Local mirror of the shared store.
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub custom_path: String,

    /// Result batches are named `{result_prefix}-{unix_millis}.json`.
    #[serde(default = "default_result_prefix")]
    pub result_prefix: String,

    #[serde(default)]
    pub reporter_base_url: Option<String>,
}

fn default_root() -> String {
    "./logs".to_string()
}

fn default_bucket() -> String {
    "testdispatch-results".to_string()
}

fn default_result_prefix() -> String {
    "testResults".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            bucket: default_bucket(),
            custom_path: String::new(),
            result_prefix: default_result_prefix(),
            reporter_base_url: None,
        }
    }
}

impl StoreSection {
    /// Reporter base URL without a trailing slash.
    pub fn reporter_base_url(&self) -> Option<&str> {
        self.reporter_base_url
            .as_deref()
            .map(|url| url.strip_suffix('/').unwrap_or(url))
    }
}

/// `[backend]` section: how each unit is started.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    /// Command template; `%TEST_FILE` and `%TEST_FILENAME` are substituted.
    /// In local mode the template is run once with `%TEST_FILE` set to
    /// `run.spec_path`.
    #[serde(default = "default_command")]
    pub command: String,

    /// Upper bound for the container backend's blocking wait.
    #[serde(default = "default_wait_max_secs")]
    pub wait_max_secs: u64,
}

fn default_command() -> String {
    "npx cypress run --browser chrome --spec %TEST_FILE".to_string()
}

fn default_wait_max_secs() -> u64 {
    1200
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            wait_max_secs: default_wait_max_secs(),
        }
    }
}

/// `[env]` section: extra variables for workers.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvSection {
    /// Names copied from this process's environment.
    #[serde(default)]
    pub passthrough: Vec<String>,

    /// Literal name/value pairs.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}
