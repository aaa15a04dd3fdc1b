//! Runtime configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use spacesync_core::{SyncError, SyncResult};
use spacesync_time::FramePeriod;

/// Files that must be present in the engine data directory
pub const REQUIRED_DATA_FILES: [&str; 2] = ["materials.cfg", "hrtfs.cfg"];

/// SpaceSync runtime configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Engine data directory (materials, HRTFs)
    pub data_dir: Option<PathBuf>,
    /// GPU the engine should run on
    pub gpu_index: u32,
    /// Host units to engine meters
    pub scale_factor: f32,
    /// Initial audio sample rate
    pub sample_rate_hz: u32,
    /// Initial samples per audio frame
    pub frame_length_samples: u32,
    /// Run the scene viewer on a background thread
    pub enable_viewer: bool,
    /// Viewer redraw interval
    #[serde(with = "humantime_duration")]
    pub viewer_interval: Duration,
    /// tracing `EnvFilter` directive
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            data_dir: None,
            gpu_index: 0,
            scale_factor: 0.01,
            sample_rate_hz: 48_000,
            frame_length_samples: 512,
            enable_viewer: false,
            viewer_interval: Duration::from_millis(33),
            log_filter: "info".into(),
        }
    }
}

impl SyncConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: SyncConfig = serde_json::from_str(json)
            .map_err(|e| SyncError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> SyncResult<()> {
        FramePeriod::new(self.frame_length_samples, self.sample_rate_hz)?;
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(SyncError::Configuration(format!(
                "scale factor must be positive, got {}",
                self.scale_factor
            )));
        }
        if self.viewer_interval.is_zero() {
            return Err(SyncError::Configuration("viewer interval is zero".into()));
        }
        EnvFilter::try_new(&self.log_filter).map_err(|e| {
            SyncError::Configuration(format!("invalid log filter {:?}: {e}", self.log_filter))
        })?;
        Ok(())
    }

    /// The data directory, if set and complete. Problems are logged, not fatal:
    /// the engine can still run without data files.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        let Some(dir) = &self.data_dir else {
            tracing::error!("no engine data directory configured");
            return None;
        };
        let missing: Vec<_> = REQUIRED_DATA_FILES
            .iter()
            .filter(|f| !dir.join(f).is_file())
            .collect();
        if missing.is_empty() {
            Some(dir.clone())
        } else {
            tracing::error!(
                data_dir = %dir.display(),
                ?missing,
                "engine data directory is incorrect"
            );
            None
        }
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
