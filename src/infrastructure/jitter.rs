//! Jitter Functions
//!
//! Randomized perturbation of timer periods so that many monitors started
//! together drift apart instead of firing in lockstep.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Function applied to a base period to obtain the actual delay.
pub type Jitter = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

/// Number of independent random sources per jitter.
const SHARDS: usize = 64;

/// Pool of random sources selected round-robin.
///
/// Spreads callers over independent generators so concurrent timers do
/// not serialize on a single lock.
struct ShardedRng {
    shards: Vec<Mutex<StdRng>>,
    next: AtomicUsize,
}

impl ShardedRng {
    fn from_entropy() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(StdRng::from_entropy())).collect(),
            next: AtomicUsize::new(0),
        }
    }

    fn seeded(seed: u64) -> Self {
        Self {
            shards: (0..SHARDS)
                .map(|i| Mutex::new(StdRng::seed_from_u64(seed.wrapping_add(i as u64))))
                .collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Uniform value in `[0, n)`, or 0 when `n` is 0.
    fn below(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let shard = self.next.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        self.shards[shard].lock().gen_range(0..n)
    }
}

fn nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Build a jitter returning `d - d/divisor + rand[0, d/divisor)`.
fn fraction_jitter(rng: ShardedRng, divisor: u64) -> Jitter {
    Arc::new(move |d: Duration| {
        let total = nanos(d);
        let window = total / divisor;
        Duration::from_nanos(total - window + rng.below(window))
    })
}

/// Uniform delay in `[0, d)`.
pub fn full_jitter() -> Jitter {
    fraction_jitter(ShardedRng::from_entropy(), 1)
}

/// Uniform delay in `[d/2, d)`.
pub fn half_jitter() -> Jitter {
    fraction_jitter(ShardedRng::from_entropy(), 2)
}

/// Uniform delay in `[6d/7, d)`.
pub fn seventh_jitter() -> Jitter {
    fraction_jitter(ShardedRng::from_entropy(), 7)
}

/// Deterministic variant of [`seventh_jitter`] for reproducible schedules.
pub fn seeded_seventh_jitter(seed: u64) -> Jitter {
    fraction_jitter(ShardedRng::seeded(seed), 7)
}

/// Deterministic variant of [`full_jitter`] for reproducible schedules.
pub fn seeded_full_jitter(seed: u64) -> Jitter {
    fraction_jitter(ShardedRng::seeded(seed), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bounds(jitter: &Jitter, base: Duration, min: Duration) {
        for _ in 0..500 {
            let d = jitter(base);
            assert!(d >= min, "{:?} below {:?}", d, min);
            assert!(d <= base, "{:?} above {:?}", d, base);
        }
    }

    #[test]
    fn test_full_jitter_bounds() {
        assert_bounds(&full_jitter(), Duration::from_millis(500), Duration::ZERO);
    }

    #[test]
    fn test_half_jitter_bounds() {
        assert_bounds(&half_jitter(), Duration::from_millis(1500), Duration::from_millis(750));
    }

    #[test]
    fn test_seventh_jitter_bounds() {
        let base = Duration::from_secs(7);
        assert_bounds(&seventh_jitter(), base, Duration::from_secs(6));
    }

    #[test]
    fn test_zero_duration() {
        assert_eq!(full_jitter()(Duration::ZERO), Duration::ZERO);
        assert_eq!(seventh_jitter()(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_tiny_duration_is_returned_unchanged_by_seventh() {
        // Window rounds down to zero, leaving the base intact.
        assert_eq!(seventh_jitter()(Duration::from_nanos(6)), Duration::from_nanos(6));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = seeded_seventh_jitter(42);
        let b = seeded_seventh_jitter(42);
        let base = Duration::from_secs(8);
        for _ in 0..10 {
            assert_eq!(a(base), b(base));
        }
    }

    #[test]
    fn test_full_jitter_spreads_values() {
        let jitter = seeded_full_jitter(7);
        let base = Duration::from_secs(1);
        let distinct: std::collections::HashSet<_> = (0..50).map(|_| jitter(base)).collect();
        assert!(distinct.len() > 40);
    }
}
