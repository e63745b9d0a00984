//! Clock Port
//!
//! Defines the time source used for scheduling and for measuring
//! round trip times.

use async_trait::async_trait;
use std::time::Instant;

/// Source of monotonic time.
///
/// Abstracted so that tests can drive timers and latency measurements
/// explicitly instead of waiting on wall-clock time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Get the current instant.
    fn now(&self) -> Instant;

    /// Suspend until the clock reaches `deadline`.
    ///
    /// Returns immediately if the deadline has already passed.
    async fn sleep_until(&self, deadline: Instant);
}
