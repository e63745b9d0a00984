//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the latency domain.
//! They have no external dependencies and contain only business logic.

use crate::domain::services::classify;
use crate::domain::value_objects::{LatencyClassification, Leg};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Latency measurements for both legs of a proxied connection.
///
/// Values are round trip times in milliseconds. Zero means the leg has
/// not been measured yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statistics {
    /// Round trip time between the client and the proxy
    pub client: u64,
    /// Round trip time between the proxy and the target host
    pub server: u64,
}

impl Statistics {
    /// Create a new snapshot.
    pub fn new(client: u64, server: u64) -> Self {
        Self { client, server }
    }

    /// Get the measurement for one leg.
    pub fn get(&self, leg: Leg) -> u64 {
        match leg {
            Leg::Client => self.client,
            Leg::Server => self.server,
        }
    }

    /// Whether neither leg has been measured.
    pub fn is_empty(&self) -> bool {
        self.client == 0 && self.server == 0
    }

    /// Classify both legs against the latency thresholds.
    pub fn classify(&self) -> LatencyClassification {
        classify(self.client, self.server)
    }
}

/// A firing of one keyed sub-interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick<K> {
    /// Which schedule fired
    pub key: K,
    /// When it fired, according to the interval's clock
    pub time: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::LatencyLevel;

    #[test]
    fn test_statistics_default_is_empty() {
        let stats = Statistics::default();
        assert!(stats.is_empty());
        assert_eq!(stats, Statistics::new(0, 0));
    }

    #[test]
    fn test_statistics_get() {
        let stats = Statistics::new(12, 34);
        assert_eq!(stats.get(Leg::Client), 12);
        assert_eq!(stats.get(Leg::Server), 34);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_statistics_classify() {
        let c = Statistics::new(160, 20).classify();
        assert_eq!(c.client, LatencyLevel::Warn);
        assert_eq!(c.server, LatencyLevel::Ok);
        assert_eq!(c.total, LatencyLevel::Warn);
    }

    #[test]
    fn test_statistics_serialization() {
        let stats = Statistics::new(5, 7);
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"client":5,"server":7}"#);
    }
}
