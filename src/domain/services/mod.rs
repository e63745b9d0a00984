//! Domain Services
//!
//! Stateless domain logic.

mod classifier;

pub use classifier::{classify, classify_leg, ERROR_THRESHOLD_MS, WARN_THRESHOLD_MS};
