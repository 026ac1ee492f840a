pub mod classifier;
pub mod enrichment;
pub mod extractor;
pub mod filter;
pub mod profile;
pub mod quota;
pub mod reconciler;
pub mod repair;
pub mod sources;
pub mod stage;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod workflow;

use std::time::Duration;

/// Fixed self-imposed rate limit between external calls.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
