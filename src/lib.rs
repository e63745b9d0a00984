//! edge-latency Library
//!
//! Continuously measures the round-trip latency of both legs of a proxied
//! connection and reports it periodically. Exposed as a library for
//! integration tests and embedding.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{LatencyMonitor, MonitorConfig, MonitorError};
pub use config::load_config;
pub use domain::entities::Statistics;
pub use domain::ports::{Clock, PingError, Pinger, ReportError, Reporter, ReporterFn};
pub use domain::value_objects::{LatencyLevel, Leg};
pub use infrastructure::{ManualClock, ShutdownController, SystemClock};
