//! SpaceSync Test Harness - two-domain simulation and protocol validation
//!
//! This crate provides:
//! - A recording acoustic engine that checks interpolation-history rules
//! - A virtual-time simulator driving the tick and audio domains together
//! - Host behaviour scenarios (drifting, stalling, starved output)

pub mod recording_engine;
pub mod clock_simulator;
pub mod scenarios;

pub use recording_engine::*;
pub use clock_simulator::*;
pub use scenarios::*;
