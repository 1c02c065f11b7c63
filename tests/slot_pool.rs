// tests/slot_pool.rs

use std::time::Duration;

use proptest::prelude::*;

use testdispatch::dispatch::{Backlog, PassRunner, SlotPool, TestUnit};
use testdispatch::poll::CompletionPoller;
use testdispatch_test_utils::builders::RunContextBuilder;
use testdispatch_test_utils::fake_cloud::{FakeCloud, Script};

#[test]
fn capacity_follows_limit_or_backlog() {
    assert_eq!(SlotPool::capacity_for(3, 10), 3);
    assert_eq!(SlotPool::capacity_for(0, 10), 10);
    assert_eq!(SlotPool::capacity_for(0, 0), 0);
}

#[test]
fn release_without_use_keeps_invariant() {
    let mut pool = SlotPool::new(2);
    pool.release();
    assert_eq!(pool.used(), 0);
    assert!(pool.acquire());
    assert!(pool.acquire());
    assert!(!pool.acquire());
    assert_eq!(pool.available(), 0);
}

#[test]
fn backlog_hands_out_each_unit_once() {
    let mut backlog = Backlog::new(vec![TestUnit::new("a"), TestUnit::new("b")]);
    assert_eq!(backlog.next_unit(), Some(TestUnit::new("a")));
    assert_eq!(backlog.remaining(), &[TestUnit::new("b")]);
    assert_eq!(backlog.next_unit(), Some(TestUnit::new("b")));
    assert_eq!(backlog.next_unit(), None);
    assert!(backlog.is_drained());
    assert_eq!(backlog.dispatched(), 2);
}

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Release,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Acquire), Just(Op::Release)]
}

proptest! {
    #[test]
    fn used_never_exceeds_capacity(
        capacity in 0usize..8,
        ops in proptest::collection::vec(op_strategy(), 0..64),
    ) {
        let mut pool = SlotPool::new(capacity);
        for op in ops {
            match op {
                Op::Acquire => { pool.acquire(); }
                Op::Release => pool.release(),
            }
            prop_assert!(pool.used() <= pool.capacity());
            prop_assert_eq!(pool.available(), pool.capacity() - pool.used());
        }
    }

    #[test]
    fn every_unit_is_admitted_exactly_once(
        units in 1usize..20,
        limit in 1usize..6,
        durations in proptest::collection::vec(1u64..30, 20),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let cloud = FakeCloud::new();
        let backlog: Vec<TestUnit> = (0..units)
            .map(|i| TestUnit::new(format!("e2e/{i}.feature")))
            .collect();
        for (unit, secs) in backlog.iter().zip(durations.iter()) {
            cloud.script(&unit.path, [Script::pass_after(Duration::from_secs(*secs))]);
        }
        let ctx = RunContextBuilder::new().concurrency(limit).build();
        let poller = CompletionPoller::new(cloud.launcher(), cloud.signals(), cloud.clock());

        let report = runtime.block_on(poller.run_pass(backlog.clone(), &ctx)).unwrap();

        prop_assert_eq!(report.admitted, units);
        prop_assert_eq!(report.completed.len(), units);
        prop_assert!(report.peak_in_flight <= limit);
        prop_assert_eq!(report.peak_in_flight, limit.min(units));

        let mut launched = cloud.launches();
        launched.sort();
        let mut expected: Vec<String> = backlog.into_iter().map(|u| u.path).collect();
        expected.sort();
        prop_assert_eq!(launched, expected);
    }
}
