//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Longest wait between broker reconnection attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Backoff for broker reconnection.
///
/// - Min delay: 100ms
/// - Max delay: 30s
/// - Unlimited attempts
/// - Jitter enabled
pub fn reconnect_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .without_max_times()
        .with_jitter()
}
