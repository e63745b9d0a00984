//! Clock Implementations
//!
//! Real time backed by tokio, and a manually advanced clock for tests.

use crate::domain::ports::Clock;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

/// Clock that only moves when [`ManualClock::advance`] is called.
///
/// Sleepers are woken as soon as an advance carries the clock past their
/// deadline.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    /// Time elapsed since `base`
    offset: watch::Sender<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        let (offset, _) = watch::channel(Duration::ZERO);
        Self {
            base: Instant::now(),
            offset,
        }
    }

    /// Move the clock forward, waking any sleeper whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        self.offset.send_modify(|offset| *offset += by);
    }

    /// Total time the clock has been advanced.
    pub fn elapsed(&self) -> Duration {
        *self.offset.borrow()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.borrow()
    }

    async fn sleep_until(&self, deadline: Instant) {
        let mut offset = self.offset.subscribe();
        loop {
            if self.base + *offset.borrow_and_update() >= deadline {
                return;
            }
            // The sender lives as long as `self`, so this only fails if the
            // clock is being torn down.
            if offset.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_system_clock_sleep_until_past_deadline() {
        let clock = SystemClock::new();
        let past = clock.now();
        tokio::time::timeout(Duration::from_secs(1), clock.sleep_until(past))
            .await
            .unwrap();
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_manual_clock_does_not_move_on_its_own() {
        let clock = ManualClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), a);
    }

    #[tokio::test]
    async fn test_manual_clock_wakes_sleeper() {
        let clock = Arc::new(ManualClock::new());
        let deadline = clock.now() + Duration::from_secs(10);

        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep_until(deadline).await })
        };

        clock.advance(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::from_secs(5));
        tokio::time::timeout(Duration::from_secs(1), sleeper)
            .await
            .unwrap()
            .unwrap();
    }
}
