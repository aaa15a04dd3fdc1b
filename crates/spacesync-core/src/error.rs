//! Error types for SpaceSync

use thiserror::Error;

use crate::{ObjectId, SourceSlot};

/// Core SpaceSync errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: sample rate is zero")]
    ZeroSampleRate,

    #[error("Configuration error: frame length is zero")]
    ZeroFrameLength,

    #[error("Configuration error: frame period overflows for {frame_length} samples")]
    FramePeriodOverflow { frame_length: u64 },

    #[error("Invalid property {name}: {value} (allowed 0..={max})")]
    InvalidProperty {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    // External engine errors
    #[error("Object {0} no longer exists in the acoustic engine")]
    ObjectMissing(ObjectId),

    #[error("Acoustic engine error: {0}")]
    Engine(String),

    // Host glue errors
    #[error("Invalid source {0}")]
    InvalidSourceSlot(SourceSlot),

    #[error("Frame length mismatch: expected {expected}, got {actual}")]
    FrameLengthMismatch { expected: u32, actual: u32 },

    #[error("Sync context not initialized")]
    NotInitialized,
}

impl SyncError {
    /// Fatal errors must stop the enclosing component from starting
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_)
                | SyncError::ZeroSampleRate
                | SyncError::ZeroFrameLength
                | SyncError::FramePeriodOverflow { .. }
                | SyncError::InvalidProperty { .. }
                | SyncError::InvalidMesh(_)
        )
    }

    /// Recoverable errors skip the current tick for one object
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::ObjectMissing(_) | SyncError::FrameLengthMismatch { .. }
        )
    }
}

/// Result type for SpaceSync operations
pub type SyncResult<T> = Result<T, SyncError>;
