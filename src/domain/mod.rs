//! Domain Layer
//!
//! Core latency concepts and the ports through which the monitor talks
//! to transports, clocks and report sinks.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{Statistics, Tick};
pub use value_objects::{LatencyClassification, LatencyLevel, Leg};
