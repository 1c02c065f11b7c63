// src/errors.rs

//! Crate-wide error type.
//!
//! Each scheduling failure kind has its own variant so callers can decide
//! whether it is fatal (`LaunchProtocolError`) or only recorded against a
//! single unit (`LaunchError`, `FileReadError`, `TransientPollError`).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Launch rejected for '{unit}': {reason}")]
    LaunchError { unit: String, reason: String },

    #[error("Could not read test file {path:?}: {reason}")]
    FileReadError { path: PathBuf, reason: String },

    #[error("Signal store check failed for '{key}': {reason}")]
    TransientPollError { key: String, reason: String },

    #[error("Execution timed out after {0} seconds. Results may vary")]
    GlobalTimeout(u64),

    #[error("Result reconciliation failed: {0}")]
    ReconciliationError(String),

    #[error("Launcher returned malformed job id {id:?} for '{unit}'")]
    LaunchProtocolError { unit: String, id: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DispatchError>;
