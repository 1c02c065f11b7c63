// tests/awaited_dispatcher.rs

use std::sync::Arc;
use std::time::Duration;

use testdispatch::dispatch::{AwaitedDispatcher, JobState, PassRunner, TestUnit};
use testdispatch::errors::DispatchError;
use testdispatch::poll::TokioClock;
use testdispatch::types::ExecuteOn;
use testdispatch_test_utils::builders::RunContextBuilder;
use testdispatch_test_utils::fake_cloud::{FakeCloud, Script};
use testdispatch_test_utils::{init_tracing, with_timeout};

fn units(n: usize) -> Vec<TestUnit> {
    (0..n).map(|i| TestUnit::new(format!("e2e/{i}.feature"))).collect()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test]
async fn never_runs_more_than_the_limit() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.set_default(Script::pass_after(ms(20)));
    let dispatcher =
        AwaitedDispatcher::new(Arc::new(cloud.task_runtime()), TokioClock, ms(1000));
    let ctx = RunContextBuilder::new()
        .execute_on(ExecuteOn::Container)
        .concurrency(3)
        .build();

    let report = with_timeout(dispatcher.run_pass(units(10), &ctx))
        .await
        .unwrap();

    assert_eq!(report.completed.len(), 10);
    assert_eq!(report.admitted, 10);
    assert!(report.peak_in_flight <= 3);
    assert!(cloud.peak_running() <= 3);
    assert_eq!(cloud.launches().len(), 10);
}

#[tokio::test]
async fn platform_timeout_and_wait_errors_are_per_unit() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.set_default(Script::pass_after(ms(5)));
    cloud.script("e2e/0.feature", [Script::TimeoutExit]);
    cloud.script("e2e/1.feature", [Script::Hang]);
    let dispatcher =
        AwaitedDispatcher::new(Arc::new(cloud.task_runtime()), TokioClock, ms(50));
    let ctx = RunContextBuilder::new().concurrency(2).build();

    let report = with_timeout(dispatcher.run_pass(units(4), &ctx))
        .await
        .unwrap();

    let mut timed_out: Vec<&str> = report.timed_out.iter().map(|j| j.unit.path.as_str()).collect();
    timed_out.sort();
    assert_eq!(timed_out, vec!["e2e/0.feature", "e2e/1.feature"]);
    assert!(report.timed_out.iter().all(|j| j.state == JobState::TimedOut));
    assert_eq!(report.completed.len(), 2);
}

#[tokio::test]
async fn rejected_launch_frees_the_permit() {
    let cloud = FakeCloud::new();
    cloud.set_default(Script::pass_after(ms(5)));
    cloud.script("e2e/0.feature", [Script::Reject("capacity".to_string())]);
    let dispatcher =
        AwaitedDispatcher::new(Arc::new(cloud.task_runtime()), TokioClock, ms(50));
    let ctx = RunContextBuilder::new().concurrency(1).build();

    let report = with_timeout(dispatcher.run_pass(units(3), &ctx))
        .await
        .unwrap();

    assert_eq!(report.launch_failures.len(), 1);
    assert_eq!(report.completed.len(), 2);
}

#[tokio::test]
async fn blank_task_handle_is_a_protocol_error() {
    let cloud = FakeCloud::new();
    cloud.script("e2e/0.feature", [Script::BlankId]);
    let dispatcher =
        AwaitedDispatcher::new(Arc::new(cloud.task_runtime()), TokioClock, ms(50));
    let ctx = RunContextBuilder::new().concurrency(1).build();

    let err = with_timeout(dispatcher.run_pass(units(2), &ctx))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::LaunchProtocolError { .. }));
}

#[tokio::test]
async fn overall_deadline_abandons_unfinished_units() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.set_default(Script::pass_after(Duration::from_secs(30)));
    let dispatcher = AwaitedDispatcher::new(
        Arc::new(cloud.task_runtime()),
        TokioClock,
        Duration::from_secs(60),
    );
    let ctx = RunContextBuilder::new()
        .concurrency(1)
        .overall_timeout(ms(50))
        .build();

    let report = with_timeout(dispatcher.run_pass(units(3), &ctx))
        .await
        .unwrap();

    assert!(report.deadline_exceeded);
    assert_eq!(report.abandoned.len(), 3);
    assert!(report.completed.is_empty());
}

#[tokio::test]
async fn overall_deadline_follows_the_injected_clock() {
    let cloud = FakeCloud::new();
    cloud.set_default(Script::pass_after(ms(200)));
    let clock = cloud.clock();
    let dispatcher =
        AwaitedDispatcher::new(Arc::new(cloud.task_runtime()), clock.clone(), ms(1000));
    // Twenty minutes of virtual time pass before any task stops.
    let ctx = RunContextBuilder::new().concurrency(2).build();

    let report = with_timeout(dispatcher.run_pass(units(2), &ctx))
        .await
        .unwrap();

    assert!(report.deadline_exceeded);
    assert_eq!(report.abandoned.len(), 2);
    assert_eq!(clock.elapsed(), ctx.settings.overall_timeout);
}
