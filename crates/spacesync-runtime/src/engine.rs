//! Boundary to the acoustic engine
//!
//! The engine is opaque: it owns the acoustic scene, the interpolation history
//! of every object and the output audio. Everything here is a request to it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use spacesync_core::{ObjectId, SyncError, SyncResult, TimeNs, Transform, Vec3};

use crate::SpatialParams;

/// Triangle mesh that audio reflects off and diffracts around.
/// Vertices are in host units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl MeshGeometry {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self { vertices, triangles }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.vertices.len() < 3 {
            return Err(SyncError::InvalidMesh(format!(
                "{} vertices, need at least 3",
                self.vertices.len()
            )));
        }
        if self.triangles.is_empty() {
            return Err(SyncError::InvalidMesh("no triangles".into()));
        }
        let count = self.vertices.len() as u32;
        if let Some(tri) = self.triangles.iter().find(|t| t.iter().any(|&i| i >= count)) {
            return Err(SyncError::InvalidMesh(format!(
                "triangle {:?} indexes past {} vertices",
                tri, count
            )));
        }
        if let Some(v) = self.vertices.iter().find(|v| !v.is_finite()) {
            return Err(SyncError::InvalidMesh(format!("non-finite vertex {:?}", v)));
        }
        Ok(())
    }

    /// Vertices converted to engine units
    pub fn scaled_vertices(&self, scale_factor: f32) -> Vec<Vec3> {
        self.vertices.iter().map(|v| v.scaled(scale_factor)).collect()
    }
}

/// Request to create an engine object
#[derive(Debug, Clone, Copy)]
pub enum ObjectSpec<'a> {
    Head { hrtf: u8, output_channel: u8 },
    Mic { output_channel: u8 },
    Speaker { output_channel: u8 },
    /// The scene's singleton listener
    Listener,
    /// The scene's singleton room
    Room,
    Mesh {
        material_index: u8,
        vertices: &'a [Vec3],
        triangles: &'a [[u32; 3]],
    },
}

/// Per-tick property refresh for an engine object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectProps {
    Head {
        hrtf: u8,
        output_channel: u8,
        test_sound: bool,
    },
    Mic {
        output_channel: u8,
        test_sound: bool,
    },
    Speaker {
        output_channel: u8,
        test_sound: bool,
    },
    Mesh {
        material_index: u8,
    },
}

/// Directivity pattern of an audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directivity {
    #[default]
    Omni,
    Cardioid,
    Beam,
}

/// Settings attached to a spatialized audio source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub volume: f32,
    pub directivity: Directivity,
    /// Beam width in degrees
    pub beam_width: f32,
    /// Cosine mix of the directivity pattern
    pub cos_mix: f32,
    /// Path amplitude above which paths are fully rendered
    pub threshold_full: f32,
    /// Path amplitude below which paths are dropped
    pub threshold_zero: f32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            volume: 1.0,
            directivity: Directivity::Omni,
            beam_width: 90.0,
            cos_mix: 0.5,
            threshold_full: 0.01,
            threshold_zero: 0.001,
        }
    }
}

/// Operations the acoustic engine provides
///
/// Implementations must be callable from both the tick thread and the audio
/// thread; any internal locking is the engine's business.
pub trait AcousticEngine: Send + Sync {
    /// Bring the engine up. `data_dir` is `None` when no valid data directory was found.
    fn startup(&self, gpu_index: u32, data_dir: Option<&Path>) -> SyncResult<()>;

    /// Tear the engine down
    fn finalize(&self);

    /// Samples per audio frame
    fn frame_length(&self) -> u32;

    /// Audio sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Set sample rate and frame length. Not allowed while processing.
    fn configure_audio(&self, sample_rate_hz: u32, frame_length: u32);

    fn object_exists(&self, id: ObjectId) -> bool;

    fn add_object(&self, spec: ObjectSpec<'_>) -> SyncResult<ObjectId>;

    fn remove_object(&self, id: ObjectId) -> SyncResult<()>;

    fn set_props(&self, id: ObjectId, props: ObjectProps) -> SyncResult<()>;

    /// Append a time-stamped transform and interpolate from history
    fn phys_update(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()>;

    /// Discard history and pin the object to a single point
    fn phys_reset(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()>;

    fn source_add(&self) -> SyncResult<ObjectId>;

    fn source_remove(&self, id: ObjectId) -> SyncResult<()>;

    fn source_configure(&self, id: ObjectId, settings: &SourceSettings) -> SyncResult<()>;

    /// Input audio for one frame, `frame_length()` mono samples
    fn source_write(&self, id: ObjectId, samples: &[f32]) -> SyncResult<()>;

    /// Run one simulation pass for the frame starting at `as_of`
    fn process(&self, as_of: TimeNs);

    fn output_channel_count(&self) -> u32;

    /// Read the previous pass's output for one channel into `out`
    fn output_channel_read(&self, channel: u32, out: &mut [f32]);

    /// Apply a batch of simulation parameters
    fn apply_params(&self, params: &SpatialParams);

    /// Open the viewer. Called on the spawning thread before the loop starts.
    fn viewer_init(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Draw one viewer frame. Returns false once the viewer wants to exit.
    fn viewer_draw(&self) -> bool {
        true
    }

    fn viewer_finalize(&self) {}
}
