//! Logging setup

use tracing_subscriber::EnvFilter;

use spacesync_core::{SyncError, SyncResult};

/// Install a fmt subscriber filtered by `filter` (EnvFilter syntax), unless
/// `RUST_LOG` is set. A subscriber already installed by the host is kept.
pub fn init_logging(filter: &str) -> SyncResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| SyncError::Configuration(format!("invalid log filter {filter:?}: {e}")))?,
    };

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}
