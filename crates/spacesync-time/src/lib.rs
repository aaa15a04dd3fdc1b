//! SpaceSync Time - Clock reconciliation between tick and audio domains
//!
//! This crate implements the synchronization protocol:
//! - Frame period: nominal duration of one audio buffer
//! - Estimated time: per-object tick-domain clock advanced by host deltas
//! - Resync decision: hard reset vs soft continuation against audio time
//! - Audio clock signal: lock-free audio time and buffer availability

pub mod frame;
pub mod clock;
pub mod signal;

pub use frame::*;
pub use clock::*;
pub use signal::*;
