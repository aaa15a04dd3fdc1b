//! Audio-domain output stage
//!
//! Drains the completed-pass counter once per output callback. No new pass
//! means silence; several passes mean the output was starved and only the
//! latest buffer is read. Nothing is queued.

use std::sync::Arc;

use spacesync_core::{SyncError, SyncResult};
use spacesync_time::{DriftWarning, OutputAvailability};

use crate::SyncContext;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub callbacks: u64,
    pub silent: u64,
    pub overdue: u64,
}

pub struct OutputSubmix {
    ctx: Arc<SyncContext>,
    /// One channel of engine output
    scratch: Vec<f32>,
    stats: OutputStats,
}

impl OutputSubmix {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        OutputSubmix {
            ctx,
            scratch: Vec::new(),
            stats: OutputStats::default(),
        }
    }

    /// Adopt the output device's sample rate, keeping the engine frame length
    pub fn init(&mut self, sample_rate_hz: u32) -> SyncResult<()> {
        self.ctx.ensure_active()?;
        let engine = self.ctx.engine();
        let frame_length = engine.frame_length();
        spacesync_time::FramePeriod::new(frame_length, sample_rate_hz)?;
        tracing::info!(sample_rate_hz, "output submix initialized");
        engine.configure_audio(sample_rate_hz, frame_length);
        self.scratch = vec![0.0; frame_length as usize];
        Ok(())
    }

    pub fn stats(&self) -> &OutputStats {
        &self.stats
    }

    /// Fill `out` (interleaved, `num_frames * num_channels`) for one callback.
    ///
    /// Silence is written whenever no new pass is available or the host frame
    /// length disagrees with the engine's.
    pub fn process(&mut self, num_frames: u32, num_channels: u32, out: &mut [f32]) -> SyncResult<OutputAvailability> {
        self.ctx.ensure_active()?;
        self.stats.callbacks += 1;

        let availability = OutputAvailability::from_passes(self.ctx.consume_available_passes());
        if let OutputAvailability::Overdue { passes } = availability {
            self.stats.overdue += 1;
            let warning = DriftWarning::OverduePasses { passes };
            tracing::info!("{}; normal once at startup", warning);
            self.ctx.notify(warning);
        }

        let ctx = Arc::clone(&self.ctx);
        let engine = ctx.engine();
        let frame_length = engine.frame_length();
        if frame_length != num_frames {
            tracing::info!(num_frames, frame_length, "output wrong frame length");
            self.silence(out);
            return Err(SyncError::FrameLengthMismatch {
                expected: frame_length,
                actual: num_frames,
            });
        }

        if !availability.has_output() {
            self.silence(out);
            return Ok(availability);
        }

        let channels = num_channels as usize;
        if out.len() != num_frames as usize * channels {
            self.silence(out);
            return Err(SyncError::Configuration(format!(
                "output buffer holds {} samples, expected {} x {}",
                out.len(),
                num_frames,
                num_channels
            )));
        }
        if num_channels > engine.output_channel_count() {
            self.silence(out);
            return Err(SyncError::Configuration(format!(
                "{} output channels requested, engine has {}",
                num_channels,
                engine.output_channel_count()
            )));
        }

        self.scratch.resize(num_frames as usize, 0.0);
        for c in 0..num_channels {
            engine.output_channel_read(c, &mut self.scratch);
            for (frame, sample) in out.chunks_exact_mut(channels).zip(&self.scratch) {
                frame[c as usize] = *sample;
            }
        }
        Ok(availability)
    }

    fn silence(&mut self, out: &mut [f32]) {
        self.stats.silent += 1;
        out.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use crate::SyncConfig;

    fn setup() -> (Arc<SyncContext>, OutputSubmix) {
        let engine = Arc::new(FakeEngine::new());
        let ctx = SyncContext::init(SyncConfig::default(), engine).unwrap();
        let mut submix = OutputSubmix::new(Arc::clone(&ctx));
        submix.init(48_000).unwrap();
        (ctx, submix)
    }

    #[test]
    fn test_no_pass_is_silence() {
        let (_ctx, mut submix) = setup();
        let mut out = vec![9.0; 512 * 2];
        assert_eq!(submix.process(512, 2, &mut out), Ok(OutputAvailability::Silence));
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(submix.stats().silent, 1);
    }

    #[test]
    fn test_single_pass_interleaves() {
        let (ctx, mut submix) = setup();
        ctx.signal().mark_pass_complete();
        let mut out = vec![0.0; 512 * 2];

        assert_eq!(submix.process(512, 2, &mut out), Ok(OutputAvailability::Ready));

        // fake engine fills channel c with c + 1
        assert_eq!(&out[..4], &[1.0, 2.0, 1.0, 2.0]);
        assert_eq!(ctx.consume_available_passes(), 0);
    }

    #[test]
    fn test_overdue_passes_still_output_latest() {
        let (ctx, mut submix) = setup();
        for _ in 0..3 {
            ctx.signal().mark_pass_complete();
        }
        let mut out = vec![0.0; 512];

        assert_eq!(
            submix.process(512, 1, &mut out),
            Ok(OutputAvailability::Overdue { passes: 3 })
        );
        assert!(out.iter().all(|&s| s == 1.0));
        assert_eq!(submix.stats().overdue, 1);

        // counter was drained
        assert_eq!(submix.process(512, 1, &mut out), Ok(OutputAvailability::Silence));
    }

    #[test]
    fn test_frame_length_mismatch_is_silence() {
        let (ctx, mut submix) = setup();
        ctx.signal().mark_pass_complete();
        let mut out = vec![5.0; 256];

        assert_eq!(
            submix.process(256, 1, &mut out),
            Err(SyncError::FrameLengthMismatch {
                expected: 512,
                actual: 256
            })
        );
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_too_many_channels_is_silence() {
        let (ctx, mut submix) = setup();
        ctx.signal().mark_pass_complete();
        let mut out = vec![7.0; 512 * 3];
        assert!(matches!(
            submix.process(512, 3, &mut out),
            Err(SyncError::Configuration(_))
        ));
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(submix.stats().silent, 1);
    }

    #[test]
    fn test_short_buffer_is_silence() {
        let (ctx, mut submix) = setup();
        ctx.signal().mark_pass_complete();
        let mut out = vec![7.0; 100];
        assert!(matches!(
            submix.process(512, 2, &mut out),
            Err(SyncError::Configuration(_))
        ));
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
