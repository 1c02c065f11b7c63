use std::time::Duration;

use testdispatch::config::{ConfigFile, RawConfigFile};
use testdispatch::context::{EnvVars, RunContext, RunSettings};
use testdispatch::types::ExecuteOn;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_tag_filter(mut self, filter: &str) -> Self {
        self.config.run.tag_filter = Some(filter.to_string());
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.config.run.concurrency_limit = limit;
        self
    }

    pub fn with_store_root(mut self, root: &str) -> Self {
        self.config.store.root = root.to_string();
        self
    }

    pub fn with_bucket(mut self, bucket: &str, custom_path: &str) -> Self {
        self.config.store.bucket = bucket.to_string();
        self.config.store.custom_path = custom_path.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RunContext` with small, test-friendly timings.
pub struct RunContextBuilder {
    run_id: String,
    execute_on: ExecuteOn,
    settings: RunSettings,
    env: EnvVars,
}

impl RunContextBuilder {
    pub fn new() -> Self {
        Self {
            run_id: "run-1".to_string(),
            execute_on: ExecuteOn::Function,
            settings: RunSettings {
                tag_filter: None,
                concurrency_limit: 0,
                per_job_timeout: Duration::from_secs(120),
                overall_timeout: Duration::from_secs(1200),
                rerun: false,
                poll_interval: Duration::from_secs(5),
            },
            env: EnvVars::new(),
        }
    }

    pub fn execute_on(mut self, execute_on: ExecuteOn) -> Self {
        self.execute_on = execute_on;
        self
    }

    pub fn tag_filter(mut self, filter: &str) -> Self {
        self.settings.tag_filter = Some(filter.to_string());
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.settings.concurrency_limit = limit;
        self
    }

    pub fn per_job_timeout(mut self, timeout: Duration) -> Self {
        self.settings.per_job_timeout = timeout;
        self
    }

    pub fn overall_timeout(mut self, timeout: Duration) -> Self {
        self.settings.overall_timeout = timeout;
        self
    }

    pub fn rerun(mut self, rerun: bool) -> Self {
        self.settings.rerun = rerun;
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> RunContext {
        let run_path = format!("bucket/{}", self.run_id);
        RunContext::new(self.run_id, run_path, self.execute_on, self.settings, self.env)
    }
}

impl Default for RunContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
