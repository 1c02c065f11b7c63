// tests/process_backend.rs

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use testdispatch::context::EnvVars;
use testdispatch::dispatch::TestUnit;
use testdispatch::exec::local::run_local_suite;
use testdispatch::exec::{
    completion_marker_key, CommandTemplate, DirSignalStore, ProcessLauncher, ProcessTaskRuntime,
    RemoteJobLauncher, SignalStore, TaskRuntime,
};
use testdispatch::fs::RealFileSystem;
use testdispatch_test_utils::{init_tracing, with_timeout};

#[test]
fn template_substitutes_path_and_file_name() {
    let template = CommandTemplate::new("run %TEST_FILE --name %TEST_FILENAME");
    let rendered = template.render(&TestUnit::new("e2e/cart/add.feature"));
    assert_eq!(rendered, "run e2e/cart/add.feature --name add.feature");
}

#[tokio::test]
async fn launcher_writes_completion_marker_when_worker_exits() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let signals = DirSignalStore::new(tmp.path());
    let launcher = ProcessLauncher::new(
        CommandTemplate::new("test \"$TL_TEST_ID\" != \"\""),
        "bucket/run-1",
        signals.clone(),
        Arc::new(RealFileSystem),
    );

    let job_id = launcher
        .launch(&TestUnit::new("a.feature"), &EnvVars::new())
        .await
        .unwrap();
    assert!(!job_id.is_empty());

    let key = completion_marker_key("bucket/run-1", &job_id);
    with_timeout(async {
        while !signals.exists(&key).await.unwrap() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(signals.marker_path(&key).ends_with("test.complete"));
}

#[tokio::test]
async fn task_runtime_reports_exit_codes() {
    let runtime = ProcessTaskRuntime::new(CommandTemplate::new("exit $CODE"));
    let mut env = EnvVars::new();

    env.insert("CODE".to_string(), "124".to_string());
    let handle = runtime.launch(&TestUnit::new("a.feature"), &env).await.unwrap();
    let exit = runtime
        .wait_stopped(&handle, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(exit.timed_out());

    env.insert("CODE".to_string(), "0".to_string());
    let handle = runtime.launch(&TestUnit::new("b.feature"), &env).await.unwrap();
    let exit = runtime
        .wait_stopped(&handle, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(exit.exit_code, Some(0));
}

#[tokio::test]
async fn task_runtime_wait_is_bounded() {
    let runtime = ProcessTaskRuntime::new(CommandTemplate::new("sleep 5"));
    let handle = runtime
        .launch(&TestUnit::new("a.feature"), &EnvVars::new())
        .await
        .unwrap();

    let result = runtime.wait_stopped(&handle, Duration::from_millis(50)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn local_suite_returns_exit_code() {
    let mut env = EnvVars::new();
    env.insert("CODE".to_string(), "3".to_string());
    assert_eq!(run_local_suite("exit $CODE", &env).await.unwrap(), 3);
}
