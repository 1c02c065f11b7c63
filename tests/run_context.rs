// tests/run_context.rs

use std::path::PathBuf;
use std::time::Instant;

use testdispatch::cli::LogLevel;
use testdispatch::config::{EnvSection, StoreSection};
use testdispatch::context::{
    results_dir, run_path, worker_env, RunContext, RunSettings, RESULTS_DIR_VAR,
};
use testdispatch::dispatch::{Job, JobState, LaunchFailure, TestUnit};
use testdispatch::logging::resolve_level;
use testdispatch::report::render_verdict;
use testdispatch::rerun::RunVerdict;
use testdispatch::results::{TestResult, TestStatus};
use testdispatch::types::ExecuteOn;
use testdispatch_test_utils::builders::ConfigFileBuilder;

#[test]
fn run_path_collapses_empty_segments() {
    assert_eq!(run_path("bucket", "", "r1"), "bucket/r1");
    assert_eq!(run_path("bucket", "nightly/", "r1"), "bucket/nightly/r1");
    assert_eq!(run_path("bucket/", "/a//b/", "r1"), "bucket/a/b/r1");
}

#[test]
fn run_path_never_escapes_the_store_root() {
    assert_eq!(run_path("", "", "r1"), "r1");
    assert_eq!(run_path("/", "/nightly", "r1"), "nightly/r1");
    assert_eq!(
        results_dir("/tmp/store", &run_path("", "", "r1")),
        PathBuf::from("/tmp/store/r1/results")
    );
}

#[test]
fn worker_env_layers_reporter_passthrough_and_values() {
    let store = StoreSection {
        bucket: "b".to_string(),
        custom_path: "c".to_string(),
        ..StoreSection::default()
    };
    let mut env = EnvSection {
        passthrough: vec!["CI".to_string(), "UNSET".to_string()],
        ..EnvSection::default()
    };
    env.values.insert("CI".to_string(), "override".to_string());
    env.values.insert("BASE_URL".to_string(), "http://x".to_string());

    let vars = worker_env("r1", ExecuteOn::Function, &store, &env, |name| {
        (name == "CI").then(|| "true".to_string())
    });

    assert_eq!(vars["TL_RUN_ID"], "r1");
    assert_eq!(vars["TL_EXECUTE_FROM"], "function");
    assert_eq!(vars["TL_RESULTS_BUCKET"], "b");
    assert_eq!(vars["TL_CUSTOM_RESULTS_PATH"], "c");
    assert_eq!(vars["TL_RESULTS_PREFIX"], "testResults");
    assert_eq!(vars["CI"], "override");
    assert_eq!(vars["BASE_URL"], "http://x");
    assert!(!vars.contains_key("UNSET"));
}

#[test]
fn context_from_config_gets_fresh_run_id() {
    let cfg = ConfigFileBuilder::new()
        .with_bucket("e2e", "nightly")
        .with_store_root("/tmp/store")
        .build();

    let a = RunContext::from_config(&cfg, ExecuteOn::Container, RunSettings::default());
    let b = RunContext::from_config(&cfg, ExecuteOn::Container, RunSettings::default());

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.run_path, format!("e2e/nightly/{}", a.run_id));
    assert_eq!(a.env["TL_EXECUTE_FROM"], "container");
    assert!(a.env[RESULTS_DIR_VAR].ends_with(&format!("{}/results", a.run_id)));
}

#[test]
fn log_level_prefers_cli_then_env() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("WARNING")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}

#[test]
fn job_reaches_a_terminal_state_once() {
    let mut job = Job::running("j1", TestUnit::new("a.feature"), Instant::now());
    assert!(!job.finish(JobState::Pending));
    assert!(job.finish(JobState::TimedOut));
    assert!(!job.finish(JobState::Completed));
    assert_eq!(job.state, JobState::TimedOut);
}

fn verdict() -> RunVerdict {
    RunVerdict {
        failed: vec![TestResult {
            test_id: "job-7".to_string(),
            title: "checkout".to_string(),
            path_to_test: "e2e/pay.feature".to_string(),
            status: TestStatus::Failed,
            started_at: None,
            ended_at: None,
        }],
        timed_out: vec![Job::running("job-9", TestUnit::new("e2e/slow.feature"), Instant::now())],
        launch_failures: vec![LaunchFailure {
            unit: TestUnit::new("e2e/x.feature"),
            reason: "throttled".to_string(),
        }],
        exit_code: 1,
        ..RunVerdict::default()
    }
}

#[test]
fn report_links_failed_tests_to_reporter() {
    let text = render_verdict(&verdict(), "r1", Some("https://reports.example.com"));

    assert!(text.contains("Run results: https://reports.example.com/run/r1"));
    assert!(text.contains("Test failed: checkout https://reports.example.com/run/r1/test/job-7"));
    assert!(text.contains("Test timed out: e2e/slow.feature (job job-9)"));
    assert!(text.contains("Launch failed: e2e/x.feature: throttled"));
    assert!(text.ends_with("exit code 1\n"));
}

#[test]
fn report_without_reporter_names_files() {
    let text = render_verdict(&verdict(), "r1", None);
    assert!(text.contains("Run id: r1"));
    assert!(text.contains("Test failed: checkout (e2e/pay.feature)"));
}
