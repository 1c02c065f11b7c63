// src/slicer.rs

//! Splitting feature files into one file per scenario, so each scenario is
//! filtered and dispatched as its own unit.
//!
//! A slice is the feature's prelude (tags, `Feature:` line, description,
//! `Background:`) followed by one scenario block, including the tag and
//! comment lines directly above its header.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::dispatch::TestUnit;
use crate::errors::{DispatchError, Result};
use crate::fs::FileSystem;
use crate::tags::SCENARIO_HEADERS;

/// The text of each scenario slice of `feature`, in file order. Empty when
/// the file has no scenario headers.
pub fn slice_feature(feature: &str) -> Vec<String> {
    let lines: Vec<&str> = feature.lines().collect();

    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_scenario_header(line))
        .map(|(index, _)| block_start(&lines, index))
        .collect();

    let Some(&first) = starts.first() else {
        return Vec::new();
    };
    let prelude = &lines[..first];

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            let mut text = String::new();
            for line in prelude.iter().chain(&lines[start..end]) {
                text.push_str(line);
                text.push('\n');
            }
            text
        })
        .collect()
}

fn is_scenario_header(line: &str) -> bool {
    let line = line.trim_start();
    SCENARIO_HEADERS.iter().any(|header| line.starts_with(header))
}

/// First line of the block owning the header at `header`: tag and comment
/// lines directly above it belong to the scenario.
fn block_start(lines: &[&str], header: usize) -> usize {
    let mut start = header;
    while start > 0 {
        let above = lines[start - 1].trim_start();
        if above.starts_with('@') || above.starts_with('#') {
            start -= 1;
        } else {
            break;
        }
    }
    start
}

/// Write the slices of every unit below `out_dir` and return them as the
/// new units, sorted by path.
///
/// Slices keep the unit's path relative to `spec_root` and are named
/// `{stem}_{n}.feature` (1-based). Units already below `out_dir` are left
/// out, so slices from an earlier run are never sliced again. A unit
/// without scenarios is kept as it is.
pub fn slice_units(
    fs: &dyn FileSystem,
    units: Vec<TestUnit>,
    spec_root: &Path,
    out_dir: &Path,
) -> Result<Vec<TestUnit>> {
    let mut sliced = Vec::new();
    let mut skipped = 0usize;

    for unit in units {
        let path = Path::new(&unit.path);
        if path.starts_with(out_dir) {
            skipped += 1;
            continue;
        }

        let text = match fs.read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                let err = DispatchError::FileReadError {
                    path: path.to_path_buf(),
                    reason: format!("{err:#}"),
                };
                warn!(error = %err, "cannot slice unreadable file; dispatching it whole");
                sliced.push(unit);
                continue;
            }
        };

        let slices = slice_feature(&text);
        if slices.is_empty() {
            debug!(unit = %unit.path, "no scenarios to slice");
            sliced.push(unit);
            continue;
        }

        let target = slice_dir_for(path, spec_root, out_dir);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("unit");

        for (n, slice) in slices.iter().enumerate() {
            let slice_path = target.join(format!("{stem}_{}.feature", n + 1));
            fs.write(&slice_path, slice.as_bytes())?;
            sliced.push(TestUnit::new(slice_path.to_string_lossy()));
        }
        debug!(unit = %unit.path, slices = slices.len(), dir = ?target, "sliced feature file");
    }

    sliced.sort();
    info!(
        units = sliced.len(),
        skipped_existing_slices = skipped,
        out_dir = ?out_dir,
        "sliced feature files per scenario"
    );
    Ok(sliced)
}

/// Directory of `path`'s slices: its parent relative to `spec_root`,
/// mirrored below `out_dir`.
fn slice_dir_for(path: &Path, spec_root: &Path, out_dir: &Path) -> PathBuf {
    match path.strip_prefix(spec_root).ok().and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => out_dir.join(parent),
        _ => out_dir.to_path_buf(),
    }
}
