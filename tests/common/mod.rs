#![allow(dead_code)] // Each integration binary uses a different subset

pub mod builders;
pub mod strategies;

#[allow(unused_imports)]
pub use builders::*;

use std::time::Duration;

/// Upper bound for anything a test awaits; a hang fails instead of blocking CI.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the tracing subscriber once for the test binary.
pub fn init_test_logging() {
    std::env::set_var("COURIER_ENV", "test");
    courier::logging::init_tracing();
}

/// Await `future` or panic after [`TEST_TIMEOUT`].
pub async fn bounded<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("operation did not complete within the test timeout")
}
