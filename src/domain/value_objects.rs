//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One half of a proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Client to proxy
    Client,
    /// Proxy to target host
    Server,
}

impl Leg {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity bucket for a latency measurement.
///
/// Variants are ordered from best to worst so the combined level of
/// several measurements is simply their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyLevel {
    Ok,
    Warn,
    Error,
}

impl LatencyLevel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Traffic-light color used by status indicators.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Ok => "green",
            Self::Warn => "yellow",
            Self::Error => "red",
        }
    }
}

impl Default for LatencyLevel {
    fn default() -> Self {
        Self::Ok
    }
}

impl fmt::Display for LatencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of both legs plus the combined verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyClassification {
    pub client: LatencyLevel,
    pub server: LatencyLevel,
    pub total: LatencyLevel,
}
