// src/discovery.rs

//! Finding the test files of a run.

use std::path::Path;

use globset::Glob;
use tracing::debug;

use crate::dispatch::TestUnit;
use crate::errors::{DispatchError, Result};
use crate::fs::{walk_files, FileSystem};

/// Units below `spec_path` matching `pattern`, sorted by path.
///
/// A `spec_path` that is a file is the only unit, whatever the pattern.
/// The pattern is matched against paths relative to `spec_path`.
pub fn discover_units(fs: &dyn FileSystem, spec_path: &Path, pattern: &str) -> Result<Vec<TestUnit>> {
    if fs.is_file(spec_path) {
        return Ok(vec![TestUnit::new(spec_path.to_string_lossy())]);
    }

    if !fs.is_dir(spec_path) {
        return Err(DispatchError::ConfigError(format!(
            "spec path {:?} is neither a file nor a directory",
            spec_path
        )));
    }

    let matcher = Glob::new(pattern)
        .map_err(|err| DispatchError::ConfigError(format!("invalid spec pattern '{pattern}': {err}")))?
        .compile_matcher();

    let mut units: Vec<TestUnit> = walk_files(fs, spec_path)?
        .into_iter()
        .filter(|path| {
            let relative = path.strip_prefix(spec_path).unwrap_or(path);
            matcher.is_match(relative)
        })
        .map(|path| TestUnit::new(path.to_string_lossy()))
        .collect();
    units.sort();

    debug!(spec_path = ?spec_path, pattern, count = units.len(), "discovered test files");
    Ok(units)
}
