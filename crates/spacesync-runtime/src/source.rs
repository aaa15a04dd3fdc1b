//! Audio-domain source spatializer
//!
//! Called from the audio thread once per source per buffer, then once after
//! all sources. Sources are stamped with the audio clock directly; the audio
//! time they see is published on the shared signal for the tick domain.

use std::sync::Arc;

use spacesync_core::{ObjectId, Quat, SourceSlot, SyncError, SyncResult, TimeNs, Transform, Vec3};
use spacesync_time::{DriftWarning, FramePeriod};

use crate::{SourceSettings, SyncContext};

/// One buffer of input for one source
#[derive(Debug, Clone, Copy)]
pub struct SourceInput<'a> {
    /// Host audio clock, seconds
    pub audio_clock: f64,
    /// Emitter position in host units
    pub position: Vec3,
    pub rotation: Quat,
    /// Interleaved samples
    pub samples: &'a [f32],
    /// 1 or 2
    pub channels: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SourceState {
    object: Option<ObjectId>,
    last_time: TimeNs,
}

pub struct SourceSpatializer {
    ctx: Arc<SyncContext>,
    slots: Vec<SourceState>,
    active: usize,
    /// Left channel of stereo input
    scratch: Vec<f32>,
}

impl SourceSpatializer {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        SourceSpatializer {
            ctx,
            slots: Vec::new(),
            active: 0,
            scratch: Vec::new(),
        }
    }

    /// Size the source table and set the engine's audio configuration
    pub fn initialize(&mut self, sample_rate_hz: u32, num_sources: u32, buffer_length: u32) -> SyncResult<()> {
        self.ctx.ensure_active()?;
        FramePeriod::new(buffer_length, sample_rate_hz)?;
        tracing::info!(sample_rate_hz, num_sources, buffer_length, "source spatializer initialized");

        self.release_all();
        self.slots = vec![SourceState::default(); num_sources as usize];
        self.scratch = Vec::with_capacity(buffer_length as usize);
        self.ctx.engine().configure_audio(sample_rate_hz, buffer_length);
        Ok(())
    }

    pub fn active_sources(&self) -> usize {
        self.active
    }

    pub fn source_object(&self, slot: SourceSlot) -> Option<ObjectId> {
        self.slots.get(slot.index()).and_then(|s| s.object)
    }

    fn slot_mut(&mut self, slot: SourceSlot) -> SyncResult<&mut SourceState> {
        self.slots
            .get_mut(slot.index())
            .ok_or(SyncError::InvalidSourceSlot(slot))
    }

    /// Create the engine source for a slot, replacing any existing one
    pub fn init_source(&mut self, slot: SourceSlot, settings: Option<&SourceSettings>) -> SyncResult<ObjectId> {
        self.ctx.ensure_active()?;
        let ctx = Arc::clone(&self.ctx);
        let engine = ctx.engine();

        let state = self.slot_mut(slot)?;
        let replaced = state.object.take();
        *state = SourceState::default();
        if let Some(old) = replaced {
            self.active -= 1;
            if let Err(e) = engine.source_remove(old) {
                tracing::warn!(%slot, error = %e, "replaced source was already gone");
            }
        }

        let id = engine.source_add()?;
        self.slots[slot.index()].object = Some(id);
        self.active += 1;

        match settings {
            Some(settings) => {
                engine.source_configure(id, settings)?;
                tracing::debug!(%slot, object = %id, "source added with settings");
            }
            None => tracing::debug!(%slot, object = %id, "source added without settings"),
        }
        Ok(id)
    }

    pub fn release_source(&mut self, slot: SourceSlot) -> SyncResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let state = self.slot_mut(slot)?;
        let id = state.object.take().ok_or(SyncError::InvalidSourceSlot(slot))?;
        state.last_time = TimeNs::ZERO;
        self.active -= 1;
        if ctx.is_active() {
            ctx.engine().source_remove(id)?;
        }
        tracing::debug!(%slot, object = %id, "source released");
        Ok(())
    }

    /// Feed one buffer for one source.
    ///
    /// A buffer whose length does not match the engine frame is skipped with
    /// `FrameLengthMismatch`.
    pub fn process_source(&mut self, slot: SourceSlot, input: SourceInput<'_>) -> SyncResult<()> {
        self.ctx.ensure_active()?;
        if !(1..=2).contains(&input.channels) {
            return Err(SyncError::Configuration(format!(
                "unsupported channel count {}",
                input.channels
            )));
        }
        let ctx = Arc::clone(&self.ctx);
        let engine = ctx.engine();

        if input.samples.len() % input.channels != 0 {
            return Err(SyncError::Configuration(format!(
                "{} samples do not split into {} channels",
                input.samples.len(),
                input.channels
            )));
        }
        let frame_length = engine.frame_length();
        let samples_per_channel = (input.samples.len() / input.channels) as u32;
        if samples_per_channel != frame_length {
            tracing::warn!(
                %slot,
                input = samples_per_channel,
                engine = frame_length,
                "wrong buffer size, is the output submix running?"
            );
            return Err(SyncError::FrameLengthMismatch {
                expected: frame_length,
                actual: samples_per_channel,
            });
        }

        let state = self.slot_mut(slot)?;
        let id = state.object.ok_or(SyncError::InvalidSourceSlot(slot))?;

        let time = TimeNs::from_secs_f64(input.audio_clock);
        ctx.record_audio_time(time);
        if time < state.last_time {
            let warning = DriftWarning::SourceBackInTime {
                previous: state.last_time,
                current: time,
            };
            tracing::warn!(%slot, "{}", warning);
            ctx.notify(warning);
        }
        state.last_time = time;

        let transform = Transform::new(
            input.position.scaled(ctx.scale_factor()),
            input.rotation,
            Vec3::ONE,
        );
        engine.phys_update(id, time, &transform)?;

        if input.channels == 1 {
            engine.source_write(id, input.samples)
        } else {
            self.scratch.clear();
            self.scratch
                .extend(input.samples.iter().step_by(input.channels).copied());
            engine.source_write(id, &self.scratch)
        }
    }

    /// Run one engine pass for the latest audio time and flag it for output.
    /// Returns whether a pass ran.
    pub fn all_sources_processed(&self) -> SyncResult<bool> {
        self.ctx.ensure_active()?;
        if self.active == 0 {
            return Ok(false);
        }
        self.ctx.engine().process(self.ctx.signal().audio_time());
        self.ctx.signal().mark_pass_complete();
        Ok(true)
    }

    fn release_all(&mut self) {
        let engine_live = self.ctx.is_active();
        for (i, state) in self.slots.iter_mut().enumerate() {
            if let Some(id) = state.object.take() {
                if engine_live {
                    if let Err(e) = self.ctx.engine().source_remove(id) {
                        tracing::warn!(slot = i, error = %e, "source already gone");
                    }
                }
            }
        }
        self.active = 0;
    }

    /// Remove every source. Skipped if the context is already shut down.
    pub fn shutdown(&mut self) {
        tracing::debug!(sources = self.active, "source spatializer shutdown");
        self.release_all();
    }
}

impl Drop for SourceSpatializer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
