// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DispatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DispatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.run, raw.store, raw.backend, raw.env))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_run_section(cfg)?;
    validate_store_section(cfg)?;
    validate_backend_section(cfg)?;
    Ok(())
}

fn validate_run_section(cfg: &RawConfigFile) -> Result<()> {
    let run = &cfg.run;

    for (name, value) in [
        ("per_job_timeout_secs", run.per_job_timeout_secs),
        ("overall_timeout_secs", run.overall_timeout_secs),
        ("poll_interval_secs", run.poll_interval_secs),
    ] {
        if value == 0 {
            return Err(DispatchError::ConfigError(format!(
                "[run].{name} must be >= 1 (got 0)"
            )));
        }
    }

    if run.spec_path.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[run].spec_path must not be empty".to_string(),
        ));
    }

    if run.slice_scenarios && run.slice_dir.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[run].slice_dir must not be empty when slice_scenarios is on".to_string(),
        ));
    }

    Glob::new(&run.spec_pattern).map_err(|err| {
        DispatchError::ConfigError(format!(
            "[run].spec_pattern '{}' is not a valid glob: {err}",
            run.spec_pattern
        ))
    })?;

    Ok(())
}

fn validate_store_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.store.result_prefix.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[store].result_prefix must not be empty".to_string(),
        ));
    }
    if cfg.store.bucket.trim_matches(|c: char| c == '/' || c.is_whitespace()).is_empty() {
        return Err(DispatchError::ConfigError(
            "[store].bucket must not be empty".to_string(),
        ));
    }
    if cfg.store.root.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[store].root must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_backend_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.backend.command.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[backend].command must not be empty".to_string(),
        ));
    }
    if cfg.backend.wait_max_secs == 0 {
        return Err(DispatchError::ConfigError(
            "[backend].wait_max_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
