//! Background scene viewer
//!
//! A cooperative loop: redraw, sleep, check the keep-running flag. Stopping
//! clears the flag and joins the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use spacesync_core::{SyncError, SyncResult};

use crate::AcousticEngine;

pub struct ViewerTask {
    keep_running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl ViewerTask {
    /// Start the viewer loop on its own thread
    pub fn spawn(engine: Arc<dyn AcousticEngine>, interval: Duration) -> SyncResult<Self> {
        engine.viewer_init()?;
        let keep_running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&keep_running);

        let handle = std::thread::Builder::new()
            .name("spacesync-viewer".into())
            .spawn(move || run(engine.as_ref(), &flag, interval))
            .map_err(|e| SyncError::Engine(format!("failed to spawn viewer: {e}")))?;

        tracing::debug!(?interval, "viewer started");
        Ok(ViewerTask {
            keep_running,
            handle: Some(handle),
        })
    }

    /// Whether the loop is still running (it may exit on its own)
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to exit and wait for it. Returns frames drawn.
    pub fn stop(&mut self) -> u64 {
        self.keep_running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(frames) => {
                tracing::debug!(frames, "viewer stopped");
                frames
            }
            Err(_) => {
                tracing::error!("viewer thread panicked");
                0
            }
        }
    }
}

impl Drop for ViewerTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(engine: &dyn AcousticEngine, keep_running: &AtomicBool, interval: Duration) -> u64 {
    let mut frames = 0;
    while keep_running.load(Ordering::Acquire) {
        if !engine.viewer_draw() {
            tracing::info!("viewer requested exit");
            break;
        }
        frames += 1;
        std::thread::sleep(interval);
    }
    engine.viewer_finalize();
    frames
}
