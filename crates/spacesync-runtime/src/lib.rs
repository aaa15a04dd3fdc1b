//! SpaceSync Runtime - Host glue around the clock reconciliation core
//!
//! Drives the acoustic engine from two domains:
//! 1. Tick domain: spatial components advance their clocks and push transforms
//! 2. Audio domain: sources record audio time, the engine processes one pass
//! 3. Output: the submix consumes completed passes or emits silence
//!
//! Process-wide state lives in a [`SyncContext`] shared by `Arc`.

pub mod config;
pub mod engine;
pub mod params;
pub mod context;
pub mod component;
pub mod source;
pub mod output;
pub mod viewer;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use engine::*;
pub use params::*;
pub use context::*;
pub use component::*;
pub use source::*;
pub use output::*;
pub use viewer::*;
