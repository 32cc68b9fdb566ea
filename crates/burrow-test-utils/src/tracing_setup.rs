//! Tracing for tests that do not use `test_log`.
//!
//! The subscriber is installed at most once per process; later calls are
//! no-ops, so every test may call [`init_test_tracing`] first thing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: burrow crates at `debug` so
/// skipped files and budget truncation show up, everything else at `warn`.
pub const DEFAULT_TEST_FILTER: &str = "warn,burrow_core=debug,burrow_config=debug";

/// Route tracing output to the test harness writer.
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     burrow_test_utils::init_test_tracing();
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER)),
        )
        .with_test_writer()
        .try_init();
}
