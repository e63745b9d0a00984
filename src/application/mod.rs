//! Application Layer
//!
//! Use cases built on top of the domain ports.

mod latency_monitor;

pub use latency_monitor::{
    LatencyMonitor, MonitorConfig, MonitorError, ScheduleKey, DEFAULT_PING_INTERVAL,
    DEFAULT_REPORT_INTERVAL,
};
