// tests/result_reconciler.rs

use std::sync::Arc;

use testdispatch::fs::RealFileSystem;
use testdispatch::fs::FileSystem;
use testdispatch::results::{
    batch_file_name, parse_batch_timestamp, DirResultStore, ResultReconciler, TestResult,
    TestStatus,
};
use testdispatch_test_utils::fake_cloud::MemoryResultStore;
use testdispatch_test_utils::init_tracing;

const PREFIX: &str = "testResults";

fn result(id: &str, path: &str, title: &str, status: TestStatus) -> TestResult {
    TestResult {
        test_id: id.to_string(),
        title: title.to_string(),
        path_to_test: path.to_string(),
        status,
        started_at: None,
        ended_at: None,
    }
}

fn two_pass_store() -> MemoryResultStore {
    let store = MemoryResultStore::new();
    store.write_batch(
        PREFIX,
        vec![
            result("j1", "e2e/cart.feature", "add item", TestStatus::Failed),
            result("j1", "e2e/cart.feature", "remove item", TestStatus::Passed),
            result("j2", "e2e/login.feature", "login", TestStatus::Failed),
        ],
    );
    store.write_batch(
        PREFIX,
        vec![result("j3", "e2e/cart.feature", "add item", TestStatus::Passed)],
    );
    store
}

#[test]
fn batch_names_round_trip_through_timestamp() {
    let name = batch_file_name(PREFIX, 1_700_000_000_123);
    assert_eq!(name, "testResults-1700000000123.json");
    assert_eq!(parse_batch_timestamp(&name, PREFIX), Some(1_700_000_000_123));
    assert_eq!(parse_batch_timestamp("other-1.json", PREFIX), None);
    assert_eq!(parse_batch_timestamp("testResults-abc.json", PREFIX), None);
    assert_eq!(parse_batch_timestamp("testResults-12.txt", PREFIX), None);
}

#[tokio::test]
async fn per_state_concatenates_without_dedup() {
    let reconciler = ResultReconciler::new(two_pass_store(), PREFIX);

    let failed = reconciler.per_state(TestStatus::Failed).await;
    let titles: Vec<&str> = failed.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["add item", "login"]);

    let passed = reconciler.per_state(TestStatus::Passed).await;
    assert_eq!(passed.len(), 2);
}

#[tokio::test]
async fn newest_batch_wins_per_identity() {
    let reconciler = ResultReconciler::new(two_pass_store(), PREFIX);

    let unique = reconciler.all_once_by_identity().await;

    assert_eq!(unique.len(), 3);
    let add_item = unique
        .iter()
        .find(|r| r.identity() == ("e2e/cart.feature", "add item"))
        .unwrap();
    assert_eq!(add_item.status, TestStatus::Passed);
    assert_eq!(add_item.test_id, "j3");
}

#[tokio::test]
async fn by_ids_selects_matching_entries() {
    let reconciler = ResultReconciler::new(two_pass_store(), PREFIX);

    let found = reconciler.by_ids(&["j1".to_string(), "j3".to_string()]).await;
    assert_eq!(found.len(), 3);
    assert!(reconciler.by_ids(&[]).await.is_empty());
}

#[tokio::test]
async fn missing_directory_reads_as_empty() {
    init_tracing();
    let store = two_pass_store();
    store.fail_listing();
    let reconciler = ResultReconciler::new(store, PREFIX);

    assert!(reconciler.per_state(TestStatus::Failed).await.is_empty());
    assert!(reconciler.all_once_by_identity().await.is_empty());
}

#[tokio::test]
async fn corrupt_and_foreign_batches_are_skipped() {
    init_tracing();
    let store = two_pass_store();
    store.put_raw("testResults-1800000000000.json", "{not json");
    store.put_raw("coverage-1900000000000.json", "[]");
    let reconciler = ResultReconciler::new(store, PREFIX);

    let unique = reconciler.all_once_by_identity().await;
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn reads_batches_from_a_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = DirResultStore::for_run(Arc::clone(&fs), tmp.path(), "bucket/run-9");

    let older = r#"[{"testId":"a","title":"checkout","pathToTest":"e2e/pay.feature","status":"failed","startedAt":"2024-05-01T10:00:00Z"}]"#;
    let newer = r#"[{"testId":"b","title":"checkout","pathToTest":"e2e/pay.feature","status":"passed"}]"#;
    fs.write(&store.dir().join("testResults-100.json"), older.as_bytes()).unwrap();
    fs.write(&store.dir().join("testResults-200.json"), newer.as_bytes()).unwrap();

    let reconciler = ResultReconciler::new(store, PREFIX);

    let failed = reconciler.per_state(TestStatus::Failed).await;
    assert_eq!(failed.len(), 1);
    assert!(failed[0].started_at.is_some());

    let unique = reconciler.all_once_by_identity().await;
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn unknown_status_values_are_tolerated() {
    let store = MemoryResultStore::new();
    store.put_raw(
        "testResults-5.json",
        r#"[{"testId":"x","title":"t","pathToTest":"p","status":"broken"}]"#,
    );
    let reconciler = ResultReconciler::new(store, PREFIX);

    let unknown = reconciler.per_state(TestStatus::Unknown).await;
    assert_eq!(unknown.len(), 1);
}
