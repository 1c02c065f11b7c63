// src/tags/mod.rs

//! Tag-filter evaluation for test files.
//!
//! A filter string such as `"@smoke and not (@flaky and @slow)"` is split
//! into *included* tags (a file must carry at least one of them) and
//! *excluded* tags (taken from the first `not ...` clause only). Later
//! `not` clauses in the same filter are ignored.
//!
//! Exclusion polarity: a file is dropped only when an excluded tag appears
//! in it *fewer* times than it has scenario headers. A file whose every
//! scenario carries the excluded tag is still dispatched.
//! TODO: confirm with the suite owners whether fully tagged files should be
//! dropped instead; `fully_tagged_exclude_clause_is_treated_as_included`
//! pins the current behaviour.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::dispatch::TestUnit;
use crate::errors::{DispatchError, Result};
use crate::fs::FileSystem;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_]+").expect("tag pattern is valid"));

static NOT_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"not\s+(\(@[A-Za-z0-9_]+(\s+and\s+@[A-Za-z0-9_]+)*\)|@[A-Za-z0-9_]+)",
    )
    .expect("not-clause pattern is valid")
});

pub(crate) const SCENARIO_HEADERS: [&str; 2] = ["Scenario:", "Scenario Outline:"];

/// Included/excluded split of a tag filter. Both lists are ordered sets
/// (first-seen order, no duplicates).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagExpression {
    pub included_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
}

impl TagExpression {
    /// Parse a filter string. Equivalent to [`categorize`].
    pub fn parse(expr: &str) -> Self {
        categorize(expr)
    }

    /// Evaluate a file's text against this expression.
    pub fn evaluate(&self, file_text: &str) -> Eligibility {
        let included = self
            .included_tags
            .iter()
            .any(|tag| contains_tag(file_text, tag));

        let not_fully_excluded = self
            .excluded_tags
            .iter()
            .all(|tag| exclusion_indicator(file_text, tag));

        Eligibility {
            included,
            not_fully_excluded,
        }
    }
}

/// Outcome of evaluating one file against a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// The file carries at least one included tag.
    pub included: bool,
    /// No excluded tag knocked the file out.
    pub not_fully_excluded: bool,
}

impl Eligibility {
    /// Eligibility when no filter is configured.
    pub const UNFILTERED: Eligibility = Eligibility {
        included: true,
        not_fully_excluded: true,
    };

    pub fn is_eligible(&self) -> bool {
        self.included && self.not_fully_excluded
    }
}

/// All `@word` tokens in `text`, duplicates preserved, first-seen order.
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Split a filter string into included and excluded tags.
pub fn categorize(expr: &str) -> TagExpression {
    let all_tags = dedup(extract_tags(expr));

    let Some(clause) = NOT_CLAUSE_RE.find(expr) else {
        return TagExpression {
            included_tags: all_tags,
            excluded_tags: Vec::new(),
        };
    };

    let excluded_tags = dedup(extract_tags(clause.as_str()));
    let included_tags = all_tags
        .into_iter()
        .filter(|tag| !excluded_tags.contains(tag))
        .collect();

    TagExpression {
        included_tags,
        excluded_tags,
    }
}

/// Whole-word match: `tag` bounded by whitespace or the ends of the text.
pub fn contains_tag(file_text: &str, tag: &str) -> bool {
    file_text.split_whitespace().any(|token| token == tag)
}

/// Evaluate `file_text` against an optional filter string.
pub fn is_eligible(file_text: &str, tag_filter: Option<&str>) -> Eligibility {
    match tag_filter {
        None => Eligibility::UNFILTERED,
        Some(expr) => categorize(expr).evaluate(file_text),
    }
}

/// Number of scenario headers (`Scenario:` and `Scenario Outline:`).
pub fn scenario_count(file_text: &str) -> usize {
    SCENARIO_HEADERS
        .iter()
        .map(|header| file_text.matches(header).count())
        .sum()
}

/// Per-tag "not fully excluded" indicator.
///
/// True when the tag is absent, when the file has no scenario headers, or
/// when the tag occurs at least as often as there are scenarios.
fn exclusion_indicator(file_text: &str, tag: &str) -> bool {
    let occurrences = file_text.matches(tag).count();
    let scenarios = scenario_count(file_text);
    occurrences == 0 || scenarios == 0 || occurrences >= scenarios
}

fn dedup(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

/// Check a single unit on disk.
pub fn check_unit(
    fs: &dyn FileSystem,
    unit: &TestUnit,
    expr: &TagExpression,
) -> Result<Eligibility> {
    let path = Path::new(&unit.path);
    let text = fs
        .read_to_string(path)
        .map_err(|err| DispatchError::FileReadError {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })?;
    Ok(expr.evaluate(&text))
}

/// Reduce discovered units to the ones eligible for dispatch.
///
/// Without a filter every unit is kept and no file is read. Units that
/// cannot be read are dropped with a warning; the run carries on.
pub fn filter_units(
    fs: &dyn FileSystem,
    units: Vec<TestUnit>,
    tag_filter: Option<&str>,
) -> Vec<TestUnit> {
    let Some(filter) = tag_filter else {
        info!(count = units.len(), "no tag filter; all discovered files are eligible");
        return units;
    };

    let expr = TagExpression::parse(filter);
    debug!(
        included = ?expr.included_tags,
        excluded = ?expr.excluded_tags,
        "categorized tag filter"
    );

    let mut eligible = Vec::with_capacity(units.len());
    for unit in units {
        let verdict = match check_unit(fs, &unit, &expr) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(unit = %unit.path, error = %err, "treating unreadable file as ineligible");
                continue;
            }
        };

        if !verdict.included {
            debug!(
                unit = %unit.path,
                tags = ?expr.included_tags,
                "file carries none of the included tags"
            );
        }
        if !verdict.not_fully_excluded {
            debug!(
                unit = %unit.path,
                tags = ?expr.excluded_tags,
                "file excluded by tag filter"
            );
        }

        if verdict.is_eligible() {
            eligible.push(unit);
        }
    }

    info!(
        filter,
        count = eligible.len(),
        files = ?eligible.iter().map(|u| u.path.as_str()).collect::<Vec<_>>(),
        "found files matching tag criteria"
    );
    eligible
}
