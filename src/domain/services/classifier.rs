//! Latency Classifier
//!
//! Maps raw round trip times onto ok/warn/error buckets.

use crate::domain::value_objects::{LatencyClassification, LatencyLevel};

/// Round trip time (ms) at which a leg is considered degraded.
pub const WARN_THRESHOLD_MS: u64 = 150;

/// Round trip time (ms) at which a leg is considered unhealthy.
pub const ERROR_THRESHOLD_MS: u64 = 400;

/// Classify a single leg.
pub fn classify_leg(latency_ms: u64) -> LatencyLevel {
    if latency_ms >= ERROR_THRESHOLD_MS {
        LatencyLevel::Error
    } else if latency_ms >= WARN_THRESHOLD_MS {
        LatencyLevel::Warn
    } else {
        LatencyLevel::Ok
    }
}

/// Classify both legs of a connection.
///
/// The total is the worst of the two legs. The legs are not summed: two
/// legs just under the warn threshold still produce an ok total.
pub fn classify(client_ms: u64, server_ms: u64) -> LatencyClassification {
    let client = classify_leg(client_ms);
    let server = classify_leg(server_ms);

    LatencyClassification {
        client,
        server,
        total: client.max(server),
    }
}
