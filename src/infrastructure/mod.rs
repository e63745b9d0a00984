//! Infrastructure Layer
//!
//! Timers, clocks and lifecycle plumbing shared by the monitor.

pub mod clock;
pub mod interval;
pub mod jitter;
pub mod shutdown;

pub use clock::{ManualClock, SystemClock};
pub use interval::{IntervalError, IntervalKey, MultiInterval, SubInterval};
pub use jitter::{full_jitter, half_jitter, seeded_full_jitter, seeded_seventh_jitter, seventh_jitter, Jitter};
pub use shutdown::{shutdown_signal, MonitorGuard, ShutdownController};
