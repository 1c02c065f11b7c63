// src/report.rs

//! Human-readable summary of a run verdict (stdout).

use std::fmt::Write as _;

use crate::rerun::RunVerdict;

/// Render the verdict. `reporter_base_url` has no trailing slash.
pub fn render_verdict(verdict: &RunVerdict, run_id: &str, reporter_base_url: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(base) = reporter_base_url {
        let _ = writeln!(out, "Run results: {base}/run/{run_id}");
    } else {
        let _ = writeln!(out, "Run id: {run_id}");
    }

    for result in &verdict.failed {
        match reporter_base_url {
            Some(base) => {
                let _ = writeln!(
                    out,
                    "Test failed: {} {base}/run/{run_id}/test/{}",
                    result.title, result.test_id
                );
            }
            None => {
                let _ = writeln!(out, "Test failed: {} ({})", result.title, result.path_to_test);
            }
        }
    }

    for job in &verdict.timed_out {
        let _ = writeln!(out, "Test timed out: {} (job {})", job.unit.path, job.id);
    }

    for result in &verdict.late_results {
        let _ = writeln!(
            out,
            "Late result from timed out job {}: {} {:?}",
            result.test_id, result.title, result.status
        );
    }

    for failure in &verdict.launch_failures {
        let _ = writeln!(out, "Launch failed: {}: {}", failure.unit.path, failure.reason);
    }

    for unit in &verdict.unresolved {
        let _ = writeln!(out, "Not rerun (no longer eligible): {}", unit.path);
    }

    if verdict.global_timeout {
        let _ = writeln!(out, "Run aborted: overall execution timeout reached");
    }

    let _ = writeln!(
        out,
        "{} failed, {} timed out, {} launch failures -> exit code {}",
        verdict.failed.len(),
        verdict.timed_out.len(),
        verdict.launch_failures.len(),
        verdict.exit_code
    );
    out
}

pub fn print_verdict(verdict: &RunVerdict, run_id: &str, reporter_base_url: Option<&str>) {
    print!("{}", render_verdict(verdict, run_id, reporter_base_url));
}
