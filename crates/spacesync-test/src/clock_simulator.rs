//! Clock Simulator - both scheduling domains in virtual time
//!
//! Simulates:
//! - An audio callback firing once per frame period, stamping sources with
//!   the audio clock, running one engine pass and draining output
//! - A host tick loop at its own rate, with drift, jitter, stalls and delta
//!   clamping, advancing one spatial component
//!
//! Events are ordered on a single virtual timeline so runs are deterministic
//! for a given seed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spacesync_core::{Quat, SourceSlot, SyncError, SyncResult, TimeNs, Transform, Vec3};
use spacesync_runtime::{
    AcousticEngine, ComponentKind, OutputSubmix, SourceInput, SourceSpatializer, SpatialComponent, SyncConfig,
    SyncContext,
};
use spacesync_time::{DriftWarning, FramePeriod, OutputAvailability, SyncDecision};

use crate::RecordingEngine;

/// How the host's tick loop misbehaves
#[derive(Clone, Debug)]
pub struct HostClockModel {
    /// Ticks per second
    pub tick_rate_hz: f64,
    /// Reported delta multiplier (1.0 = honest, >1.0 = fast)
    pub drift_rate: f64,
    /// Uniform jitter on tick arrival, microseconds
    pub jitter_us: u32,
    /// Freeze the host every N ticks
    pub stall_every: Option<u64>,
    /// Length of each freeze
    pub stall: Duration,
    /// Largest delta the host will report (engines clamp long frames)
    pub max_delta: Option<f64>,
}

impl HostClockModel {
    pub fn new(tick_rate_hz: f64) -> Self {
        HostClockModel {
            tick_rate_hz,
            drift_rate: 1.0,
            jitter_us: 0,
            stall_every: None,
            stall: Duration::ZERO,
            max_delta: None,
        }
    }

    pub fn with_drift(mut self, drift_rate: f64) -> Self {
        self.drift_rate = drift_rate;
        self
    }

    pub fn with_jitter(mut self, jitter_us: u32) -> Self {
        self.jitter_us = jitter_us;
        self
    }

    pub fn with_stalls(mut self, every: u64, stall: Duration, max_delta: f64) -> Self {
        self.stall_every = Some(every);
        self.stall = stall;
        self.max_delta = Some(max_delta);
        self
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    /// Delta the host reports for a tick that really took `elapsed`
    fn reported_delta(&self, elapsed: Duration) -> f64 {
        let delta = elapsed.as_secs_f64() * self.drift_rate;
        match self.max_delta {
            Some(max) => delta.min(max),
            None => delta,
        }
    }

    /// Real time until the next tick
    fn next_interval(&self, rng: &mut StdRng) -> u64 {
        let interval = self.tick_interval().as_nanos() as i64;
        let jitter = if self.jitter_us > 0 {
            rng.gen_range(-(self.jitter_us as i64)..=self.jitter_us as i64) * 1_000
        } else {
            0
        };
        (interval + jitter).max(1) as u64
    }
}

/// Simulation parameters
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub sample_rate_hz: u32,
    pub frame_length: u32,
    pub host: HostClockModel,
    /// Output callback runs on every Nth audio callback
    pub output_every: u32,
    pub seed: u64,
}

impl SimConfig {
    pub fn new(host: HostClockModel) -> Self {
        SimConfig {
            sample_rate_hz: 48_000,
            frame_length: 512,
            host,
            output_every: 1,
            seed: 0,
        }
    }
}

/// Simulation result and statistics
#[derive(Debug, Default, Clone)]
pub struct SimulationResult {
    pub ticks: u64,
    pub audio_callbacks: u64,
    pub resyncs_ahead: u64,
    pub resyncs_behind: u64,
    pub stalls: u64,
    /// Largest |component time - audio next| seen on a continue tick
    pub max_continue_divergence_ns: u64,
    pub outputs_ready: u64,
    pub outputs_silent: u64,
    pub outputs_overdue: u64,
    /// Diagnostics delivered through the context hook
    pub diagnostics: u64,
    pub history_violations: usize,
}

impl SimulationResult {
    pub fn resyncs(&self) -> u64 {
        self.resyncs_ahead + self.resyncs_behind
    }

    fn record_tick(&mut self, decision: SyncDecision, time: TimeNs, audio_next: TimeNs) {
        self.ticks += 1;
        match decision {
            SyncDecision::Continue => {
                self.max_continue_divergence_ns = self
                    .max_continue_divergence_ns
                    .max(time.abs_diff(audio_next));
            }
            SyncDecision::ResyncAhead { .. } => self.resyncs_ahead += 1,
            SyncDecision::ResyncBehind { .. } => self.resyncs_behind += 1,
        }
    }

    fn record_output(&mut self, availability: OutputAvailability) {
        match availability {
            OutputAvailability::Ready => self.outputs_ready += 1,
            OutputAvailability::Silence => self.outputs_silent += 1,
            OutputAvailability::Overdue { .. } => self.outputs_overdue += 1,
        }
    }
}

/// Drives a context, one component, one source and the output stage
pub struct ClockSimulator {
    config: SimConfig,
    engine: Arc<RecordingEngine>,
    ctx: Arc<SyncContext>,
    component: SpatialComponent,
    sources: SourceSpatializer,
    output: OutputSubmix,
    period: FramePeriod,
    rng: StdRng,
    diagnostics: Arc<AtomicU64>,
    /// Virtual time of the next audio callback / host tick, nanoseconds
    next_audio_ns: u64,
    next_tick_ns: u64,
    last_tick_ns: u64,
    /// The next tick arrives late by one stall
    stall_pending: bool,
    frames: u64,
    input: Vec<f32>,
    out: Vec<f32>,
    result: SimulationResult,
}

impl ClockSimulator {
    pub fn new(config: SimConfig) -> SyncResult<Self> {
        if config.output_every == 0 {
            return Err(SyncError::Configuration("output_every must be at least 1".into()));
        }
        let engine = Arc::new(RecordingEngine::new());
        let sync_config = SyncConfig {
            sample_rate_hz: config.sample_rate_hz,
            frame_length_samples: config.frame_length,
            ..SyncConfig::default()
        };
        let ctx = SyncContext::init(sync_config, engine.clone())?;

        let diagnostics = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&diagnostics);
        ctx.set_diagnostic_hook(Box::new(move |_: &DriftWarning| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        let mut sources = SourceSpatializer::new(Arc::clone(&ctx));
        sources.initialize(config.sample_rate_hz, 1, config.frame_length)?;
        sources.init_source(SourceSlot::new(0), None)?;

        let mut output = OutputSubmix::new(Arc::clone(&ctx));
        output.init(config.sample_rate_hz)?;

        let mut component = SpatialComponent::new(ComponentKind::head(0, 0));
        component.register(&ctx, true)?;

        let period = FramePeriod::new(config.frame_length, config.sample_rate_hz)?;
        let channels = engine.output_channel_count() as usize;

        Ok(ClockSimulator {
            rng: StdRng::seed_from_u64(config.seed),
            input: vec![0.0; config.frame_length as usize],
            out: vec![0.0; config.frame_length as usize * channels],
            config,
            engine,
            ctx,
            component,
            sources,
            output,
            period,
            diagnostics,
            next_audio_ns: 0,
            next_tick_ns: 0,
            last_tick_ns: 0,
            stall_pending: false,
            frames: 0,
            result: SimulationResult::default(),
        })
    }

    pub fn engine(&self) -> &Arc<RecordingEngine> {
        &self.engine
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    pub fn component(&self) -> &SpatialComponent {
        &self.component
    }

    /// Run for a span of virtual time
    pub fn run(&mut self, duration: Duration) -> SyncResult<SimulationResult> {
        let end = self.next_audio_ns.min(self.next_tick_ns) + duration.as_nanos() as u64;
        loop {
            // Audio wins ties: the tick then sees the fresh audio time
            if self.next_audio_ns <= self.next_tick_ns {
                if self.next_audio_ns >= end {
                    break;
                }
                self.audio_callback()?;
            } else {
                if self.next_tick_ns >= end {
                    break;
                }
                self.host_tick()?;
            }
        }
        self.result.diagnostics = self.diagnostics.load(Ordering::Relaxed);
        self.result.history_violations = self.engine.violations().len();
        tracing::debug!(
            ticks = self.result.ticks,
            callbacks = self.result.audio_callbacks,
            resyncs = self.result.resyncs(),
            stalls = self.result.stalls,
            "simulation finished"
        );
        Ok(self.result.clone())
    }

    fn audio_callback(&mut self) -> SyncResult<()> {
        let slot = SourceSlot::new(0);
        let clock_secs =
            self.frames as f64 * self.config.frame_length as f64 / self.config.sample_rate_hz as f64;
        self.sources.process_source(
            slot,
            SourceInput {
                audio_clock: clock_secs,
                position: Vec3::new(100.0, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                samples: &self.input,
                channels: 1,
            },
        )?;
        self.sources.all_sources_processed()?;

        if self.frames % self.config.output_every as u64 == self.config.output_every as u64 - 1 {
            let channels = (self.out.len() / self.config.frame_length as usize) as u32;
            let availability = self
                .output
                .process(self.config.frame_length, channels, &mut self.out)?;
            self.result.record_output(availability);
        }

        self.result.audio_callbacks += 1;
        self.frames += 1;
        self.next_audio_ns += self.period.as_nanos();
        Ok(())
    }

    fn host_tick(&mut self) -> SyncResult<()> {
        let now = self.next_tick_ns;
        if self.stall_pending {
            self.result.stalls += 1;
            self.stall_pending = false;
        }
        let elapsed = Duration::from_nanos(now - self.last_tick_ns);
        let delta = self.config.host.reported_delta(elapsed);

        let yaw = (now as f64 * 1e-9) as f32;
        let transform = Transform::new(Vec3::new(0.0, 0.0, 170.0), Quat::from_yaw(yaw), Vec3::ONE);
        if let Some(r) = self.component.tick(&self.ctx, delta, transform)? {
            let audio_next = self.period.next_frame_after(self.ctx.signal().audio_time());
            self.result.record_tick(r.decision, r.time, audio_next);
        }

        self.last_tick_ns = now;
        let ticks = self.result.ticks;
        let mut next = now + self.config.host.next_interval(&mut self.rng);
        if let Some(every) = self.config.host.stall_every {
            if ticks > 0 && ticks % every == 0 {
                self.stall_pending = true;
                next += self.config.host.stall.as_nanos() as u64;
            }
        }
        self.next_tick_ns = next;
        Ok(())
    }
}
