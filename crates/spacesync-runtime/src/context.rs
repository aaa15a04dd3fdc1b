//! Process-wide sync context
//!
//! Everything both domains share: the engine handle, the audio clock signal,
//! the active flag and scale factor, the parameter lock and the viewer.
//! Created by [`SyncContext::init`], torn down by [`SyncContext::shutdown`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use spacesync_core::{SyncError, SyncResult, TimeNs};
use spacesync_time::{AudioClockSignal, DriftWarning, FramePeriod};

use crate::{AcousticEngine, SpatialParams, SyncConfig, ViewerTask};

/// Host callback receiving every timing diagnostic
pub type DiagnosticHook = Box<dyn Fn(&DriftWarning) + Send + Sync>;

pub struct SyncContext {
    engine: Arc<dyn AcousticEngine>,
    signal: Arc<AudioClockSignal>,
    active: AtomicBool,
    /// f32 bits
    scale_factor: AtomicU32,
    /// Held across a whole parameter batch
    params: Mutex<SpatialParams>,
    hook: RwLock<Option<DiagnosticHook>>,
    viewer: Mutex<Option<ViewerTask>>,
    config: SyncConfig,
}

impl SyncContext {
    /// Validate configuration, start the engine and mark the context active.
    /// A configuration error prevents startup.
    pub fn init(config: SyncConfig, engine: Arc<dyn AcousticEngine>) -> SyncResult<Arc<Self>> {
        config.validate()?;
        crate::telemetry::init_logging(&config.log_filter)?;

        let data_dir = config.resolve_data_dir();
        engine.startup(config.gpu_index, data_dir.as_deref())?;
        engine.configure_audio(config.sample_rate_hz, config.frame_length_samples);

        let params = SpatialParams::default();
        engine.apply_params(&params);

        let signal = Arc::new(AudioClockSignal::new());
        signal.clear();

        let viewer = if config.enable_viewer {
            match ViewerTask::spawn(Arc::clone(&engine), config.viewer_interval) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::error!(error = %e, "viewer failed to start");
                    engine.finalize();
                    return Err(e);
                }
            }
        } else {
            None
        };

        let ctx = SyncContext {
            engine,
            signal,
            active: AtomicBool::new(true),
            scale_factor: AtomicU32::new(config.scale_factor.to_bits()),
            params: Mutex::new(params),
            hook: RwLock::new(None),
            viewer: Mutex::new(viewer),
            config,
        };

        tracing::info!(
            sample_rate_hz = ctx.config.sample_rate_hz,
            frame_length = ctx.config.frame_length_samples,
            viewer = ctx.config.enable_viewer,
            "spacesync initialized"
        );
        Ok(Arc::new(ctx))
    }

    /// Stop the viewer, clear the audio signal and finalize the engine.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(mut viewer) = self.viewer.lock().take() {
            viewer.stop();
        }
        self.signal.clear();
        self.engine.finalize();
        tracing::info!("spacesync finalized");
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_active(&self) -> SyncResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }

    #[inline]
    pub fn engine(&self) -> &dyn AcousticEngine {
        self.engine.as_ref()
    }

    #[inline]
    pub fn signal(&self) -> &Arc<AudioClockSignal> {
        &self.signal
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[inline]
    pub fn scale_factor(&self) -> f32 {
        f32::from_bits(self.scale_factor.load(Ordering::Relaxed))
    }

    pub fn set_scale_factor(&self, scale: f32) -> SyncResult<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(SyncError::Configuration(format!(
                "scale factor must be positive, got {scale}"
            )));
        }
        self.scale_factor.store(scale.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Current frame period, from the engine's live audio configuration
    pub fn frame_period(&self) -> SyncResult<FramePeriod> {
        FramePeriod::new(self.engine.frame_length(), self.engine.sample_rate())
    }

    /// Audio domain: publish the current callback's audio time
    #[inline]
    pub fn record_audio_time(&self, time: TimeNs) -> TimeNs {
        self.signal.record_audio_time(time)
    }

    /// Output side: drain completed processing passes
    #[inline]
    pub fn consume_available_passes(&self) -> u32 {
        self.signal.consume_available_passes()
    }

    pub fn set_diagnostic_hook(&self, hook: DiagnosticHook) {
        *self.hook.write() = Some(hook);
    }

    pub fn clear_diagnostic_hook(&self) {
        *self.hook.write() = None;
    }

    /// Forward a diagnostic to the host hook, if any
    pub fn notify(&self, warning: DriftWarning) {
        if let Some(hook) = self.hook.read().as_ref() {
            hook(&warning);
        }
    }

    /// Apply a parameter batch under the parameter lock
    pub fn apply_params(&self, params: SpatialParams) -> SyncResult<()> {
        self.ensure_active()?;
        params.validate()?;
        let mut current = self.params.lock();
        self.engine.apply_params(&params);
        *current = params;
        tracing::debug!(order = current.order, mask = current.order_mask(), "parameters applied");
        Ok(())
    }

    pub fn params(&self) -> SpatialParams {
        self.params.lock().clone()
    }

    pub fn viewer_running(&self) -> bool {
        self.viewer.lock().as_ref().is_some_and(|v| v.is_running())
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn init(engine: &Arc<FakeEngine>) -> Arc<SyncContext> {
        SyncContext::init(SyncConfig::default(), engine.clone()).unwrap()
    }

    #[test]
    fn test_init_configures_engine() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = init(&engine);

        assert!(ctx.is_active());
        assert_eq!(engine.sample_rate(), 48_000);
        assert_eq!(engine.frame_length(), 512);
        assert_eq!(ctx.frame_period().unwrap().as_nanos(), 10_666_666);
        assert_eq!(ctx.scale_factor(), 0.01);
    }

    #[test]
    fn test_zero_sample_rate_prevents_startup() {
        let engine = Arc::new(FakeEngine::new());
        let config = SyncConfig {
            sample_rate_hz: 0,
            ..Default::default()
        };
        let err = SyncContext::init(config, engine.clone()).err().unwrap();
        assert_eq!(err, SyncError::ZeroSampleRate);
        assert!(!engine.started());
    }

    #[test]
    fn test_bad_log_filter_prevents_startup() {
        let engine = Arc::new(FakeEngine::new());
        let config = SyncConfig {
            log_filter: "spacesync=loudest".into(),
            ..Default::default()
        };
        let err = SyncContext::init(config, engine.clone()).err().unwrap();
        assert!(err.is_configuration());
        assert!(!engine.started());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = init(&engine);
        ctx.record_audio_time(TimeNs(99));
        ctx.signal().mark_pass_complete();

        ctx.shutdown();
        ctx.shutdown();

        assert!(!ctx.is_active());
        assert_eq!(ctx.signal().audio_time(), TimeNs::ZERO);
        assert_eq!(ctx.consume_available_passes(), 0);
        assert_eq!(engine.finalize_count(), 1);
        assert_eq!(ctx.ensure_active(), Err(SyncError::NotInitialized));
    }

    #[test]
    fn test_drop_shuts_down() {
        let engine = Arc::new(FakeEngine::new());
        drop(init(&engine));
        assert_eq!(engine.finalize_count(), 1);
    }

    #[test]
    fn test_viewer_lifecycle() {
        let engine = Arc::new(FakeEngine::new());
        let config = SyncConfig {
            enable_viewer: true,
            viewer_interval: Duration::from_millis(1),
            ..Default::default()
        };
        let ctx = SyncContext::init(config, engine.clone()).unwrap();
        assert!(ctx.viewer_running());

        ctx.shutdown();
        assert!(!ctx.viewer_running());
        assert!(engine.viewer_finalized());
    }

    #[test]
    fn test_viewer_failure_finalizes_engine() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_viewer_init();
        let config = SyncConfig {
            enable_viewer: true,
            ..Default::default()
        };

        let err = SyncContext::init(config, engine.clone()).err().unwrap();

        assert!(matches!(err, SyncError::Engine(_)));
        assert!(engine.started());
        assert_eq!(engine.finalize_count(), 1);
    }

    #[test]
    fn test_scale_factor() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = init(&engine);
        ctx.set_scale_factor(1.0).unwrap();
        assert_eq!(ctx.scale_factor(), 1.0);
        assert!(ctx.set_scale_factor(-1.0).is_err());
        assert_eq!(ctx.scale_factor(), 1.0);
    }

    #[test]
    fn test_diagnostic_hook() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = init(&engine);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        ctx.set_diagnostic_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        ctx.notify(DriftWarning::ZeroDelta);
        ctx.notify(DriftWarning::Ahead { by_ns: 1 });
        ctx.clear_diagnostic_hook();
        ctx.notify(DriftWarning::ZeroDelta);

        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_apply_params() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = init(&engine);
        let params = SpatialParams {
            order: 5,
            ..Default::default()
        };
        ctx.apply_params(params.clone()).unwrap();
        assert_eq!(ctx.params(), params);
        assert_eq!(engine.last_params().map(|p| p.order), Some(5));

        let bad = SpatialParams {
            order: 42,
            ..Default::default()
        };
        assert!(ctx.apply_params(bad).is_err());
        assert_eq!(ctx.params().order, 5);
    }
}
