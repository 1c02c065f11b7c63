//! Test doubles and builders shared by the `testdispatch` integration tests.

pub mod builders;
pub mod fake_cloud;

pub use fake_cloud::{FakeCloud, ManualClock, MemoryResultStore, Script};

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output is captured by the harness and shown for failing tests only.
/// `RUST_LOG` overrides the default of `info` with scheduler debug events.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,testdispatch=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Fail the test if `f` does not finish within five seconds of real time.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("test did not finish within 5 seconds")
}
