//! SpaceSync Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by the clock and runtime crates:
//! - Identifiers (ObjectId, SourceSlot)
//! - Nanosecond time (TimeNs)
//! - Transforms handed to the acoustic engine
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod transform;
pub mod error;

pub use id::*;
pub use time::*;
pub use transform::*;
pub use error::*;
