//! Simulation parameter preset
//!
//! A host-editable batch of acoustic parameters. The engine interprets them;
//! this crate only validates, stores and forwards the batch.

use serde::{Deserialize, Serialize};

use spacesync_core::{SyncError, SyncResult};

/// Highest reflection order the engine supports
pub const MAX_ORDER: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialParams {
    /// Maximum reflection/diffraction order
    pub order: u32,
    /// Per-order enable flags, index 0 is the direct path
    pub enabled_orders: [bool; 7],
    /// Longest path delay, in frames
    pub max_path_delay_frames: u32,
    /// Target number of search rays
    pub search_rays: u32,
    /// Ray tracing rays and branches
    pub rt_rays: u32,
    pub rt_branches: u32,
    /// Volume and delay smoothing factors
    pub lambda_volume: f32,
    pub lambda_delay: f32,
    /// Longest delay a head or speaker may add, seconds
    pub longest_delay: f32,
    pub head_extra_delay: f32,
    pub delay_change_factor: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        SpatialParams {
            order: 3,
            enabled_orders: [true; 7],
            max_path_delay_frames: 16,
            search_rays: 1024,
            rt_rays: 256,
            rt_branches: 4,
            lambda_volume: 0.1,
            lambda_delay: 0.1,
            longest_delay: 0.5,
            head_extra_delay: 0.001,
            delay_change_factor: 1.0,
        }
    }
}

impl SpatialParams {
    /// Packed enable flags, bit n for order n
    pub fn order_mask(&self) -> u32 {
        self.enabled_orders
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.order > MAX_ORDER {
            return Err(SyncError::InvalidProperty {
                name: "order",
                value: self.order,
                max: MAX_ORDER,
            });
        }
        if self.max_path_delay_frames == 0 {
            return Err(SyncError::Configuration(
                "max_path_delay_frames must be positive".into(),
            ));
        }
        for (name, v) in [
            ("lambda_volume", self.lambda_volume),
            ("lambda_delay", self.lambda_delay),
            ("longest_delay", self.longest_delay),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SyncError::Configuration(format!("{name} must be finite and non-negative")));
            }
        }
        Ok(())
    }
}
