//! Tick-domain clock and its reconciliation against the audio domain

use std::fmt;

use spacesync_core::{TimeNs, NANOS_PER_SEC};

use crate::FramePeriod;

/// Non-fatal timing diagnostics. Never alter the computed times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriftWarning {
    /// Host delivered a tick with zero delta
    ZeroDelta,
    /// Host delivered a tick with a negative delta
    NegativeDelta { delta_seconds: f64 },
    /// Tick clock ran ahead of audio and was pulled back
    Ahead { by_ns: u64 },
    /// Tick clock fell behind audio and was pushed forward
    Behind { by_ns: u64 },
    /// An audio source was processed at an earlier audio time than before
    SourceBackInTime { previous: TimeNs, current: TimeNs },
    /// Several processing passes completed before output consumed one
    OverduePasses { passes: u32 },
}

impl fmt::Display for DriftWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftWarning::ZeroDelta => write!(f, "tick delta is zero"),
            DriftWarning::NegativeDelta { delta_seconds } => {
                write!(f, "tick delta is negative ({delta_seconds})")
            }
            DriftWarning::Ahead { by_ns } => write!(f, "component ahead of audio by {by_ns} ns"),
            DriftWarning::Behind { by_ns } => write!(f, "component behind audio by {by_ns} ns"),
            DriftWarning::SourceBackInTime { previous, current } => {
                write!(f, "source processed back in time ({previous} -> {current})")
            }
            DriftWarning::OverduePasses { passes } => {
                write!(f, "process completed {passes} times before output")
            }
        }
    }
}

/// Outcome of comparing the estimated tick time with audio time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDecision {
    /// Within threshold: append to the interpolation history
    Continue,
    /// Estimate exceeded audio time by more than the threshold
    ResyncAhead { by_ns: u64 },
    /// Estimate trailed audio time by more than the threshold
    ResyncBehind { by_ns: u64 },
}

impl SyncDecision {
    #[inline]
    pub fn is_reset(self) -> bool {
        !matches!(self, SyncDecision::Continue)
    }

    /// Divergence that triggered a resync, zero on continue
    pub fn divergence_ns(self) -> u64 {
        match self {
            SyncDecision::Continue => 0,
            SyncDecision::ResyncAhead { by_ns } | SyncDecision::ResyncBehind { by_ns } => by_ns,
        }
    }

    pub fn warning(self) -> Option<DriftWarning> {
        match self {
            SyncDecision::Continue => None,
            SyncDecision::ResyncAhead { by_ns } => Some(DriftWarning::Ahead { by_ns }),
            SyncDecision::ResyncBehind { by_ns } => Some(DriftWarning::Behind { by_ns }),
        }
    }
}

/// Result of one tick of a tracked object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reconciled {
    /// Time to stamp this tick's transform with
    pub time: TimeNs,
    /// Resync or continue
    pub decision: SyncDecision,
    /// Diagnostic about the tick delta itself, if any
    pub delta_warning: Option<DriftWarning>,
}

impl Reconciled {
    /// Reset ticks must discard the engine's interpolation history
    #[inline]
    pub fn was_reset(&self) -> bool {
        self.decision.is_reset()
    }

    /// All diagnostics raised by this tick, delta first
    pub fn warnings(&self) -> impl Iterator<Item = DriftWarning> {
        self.delta_warning.into_iter().chain(self.decision.warning())
    }
}

/// Candidate estimate: `last + trunc(delta * 1e9)`.
/// Negative deltas move the estimate backwards, clamped at zero.
pub fn estimate_time(last: TimeNs, delta_seconds: f64) -> TimeNs {
    let delta_ns = (delta_seconds * NANOS_PER_SEC as f64) as i64;
    last.saturating_add_signed(delta_ns)
}

/// Diagnose a non-positive tick delta
pub fn check_tick_delta(delta_seconds: f64) -> Option<DriftWarning> {
    if delta_seconds == 0.0 {
        Some(DriftWarning::ZeroDelta)
    } else if delta_seconds < 0.0 {
        Some(DriftWarning::NegativeDelta { delta_seconds })
    } else {
        None
    }
}

/// Compare an estimate with audio time as of the next output frame.
/// Divergence must strictly exceed 2.5 frame periods to resync.
pub fn decide(estimated: TimeNs, audio_next: TimeNs, period: FramePeriod) -> SyncDecision {
    let threshold = period.resync_threshold();
    if estimated > audio_next && estimated.as_nanos() - audio_next.as_nanos() > threshold {
        SyncDecision::ResyncAhead {
            by_ns: estimated.as_nanos() - audio_next.as_nanos(),
        }
    } else if audio_next > estimated && audio_next.as_nanos() - estimated.as_nanos() > threshold {
        SyncDecision::ResyncBehind {
            by_ns: audio_next.as_nanos() - estimated.as_nanos(),
        }
    } else {
        SyncDecision::Continue
    }
}

/// Per-object tick-domain clock
///
/// Created when an object activates, advanced once per host tick, reset when
/// the object deactivates.
#[derive(Clone, Debug, Default)]
pub struct ClockState {
    /// Last reconciled estimate
    last_estimated: TimeNs,
    /// Ticks since activation
    ticks: u64,
    /// Resyncs since activation
    resyncs: u64,
}

impl ClockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known time instead of zero
    pub fn starting_at(time: TimeNs) -> Self {
        ClockState {
            last_estimated: time,
            ..Self::default()
        }
    }

    /// Advance by one host tick and reconcile against the audio clock.
    ///
    /// `audio_time` is the latest recorded audio-domain time; the comparison
    /// is made against it plus one frame period.
    pub fn advance(&mut self, delta_seconds: f64, audio_time: TimeNs, period: FramePeriod) -> Reconciled {
        let delta_warning = check_tick_delta(delta_seconds);
        if let Some(warning) = delta_warning {
            tracing::warn!(delta_seconds, "{}", warning);
        }

        let estimated = estimate_time(self.last_estimated, delta_seconds);
        let audio_next = period.next_frame_after(audio_time);
        let decision = decide(estimated, audio_next, period);

        if let Some(warning) = decision.warning() {
            tracing::info!(by_ns = decision.divergence_ns(), "{}, re-synchronizing", warning);
        }
        self.last_estimated = match decision {
            SyncDecision::Continue => estimated,
            SyncDecision::ResyncAhead { .. } | SyncDecision::ResyncBehind { .. } => audio_next,
        };

        self.ticks += 1;
        if decision.is_reset() {
            self.resyncs += 1;
        }

        Reconciled {
            time: self.last_estimated,
            decision,
            delta_warning,
        }
    }

    /// Last reconciled estimate
    pub fn last_estimated(&self) -> TimeNs {
        self.last_estimated
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Discard all state (object deactivated)
    pub fn reset(&mut self) {
        *self = ClockState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms_period() -> FramePeriod {
        FramePeriod::from_nanos(1_000_000)
    }

    #[test]
    fn test_estimate_truncates() {
        assert_eq!(estimate_time(TimeNs::ZERO, 0.02), TimeNs(20_000_000));
        assert_eq!(estimate_time(TimeNs(5), 1.9e-9), TimeNs(6));
    }

    #[test]
    fn test_estimate_negative_delta_reduces() {
        let last = TimeNs::from_millis(100);
        assert_eq!(estimate_time(last, -0.01), TimeNs::from_millis(90));
        assert_eq!(estimate_time(last, -1.0), TimeNs::ZERO);
    }

    #[test]
    fn test_estimate_non_finite_delta() {
        let last = TimeNs::from_millis(100);
        assert_eq!(estimate_time(last, f64::NAN), last);
    }

    #[test]
    fn test_delta_warnings() {
        assert_eq!(check_tick_delta(0.0), Some(DriftWarning::ZeroDelta));
        assert_eq!(
            check_tick_delta(-0.5),
            Some(DriftWarning::NegativeDelta { delta_seconds: -0.5 })
        );
        assert_eq!(check_tick_delta(0.016), None);
        assert_eq!(DriftWarning::ZeroDelta.to_string(), "tick delta is zero");
    }

    #[test]
    fn test_threshold_boundary() {
        let audio = TimeNs::from_millis(50);
        let at = audio.saturating_add_nanos(2_500_000);
        assert_eq!(decide(at, audio, ms_period()), SyncDecision::Continue);

        let past = audio.saturating_add_nanos(2_500_001);
        assert_eq!(
            decide(past, audio, ms_period()),
            SyncDecision::ResyncAhead { by_ns: 2_500_001 }
        );

        let behind_at = TimeNs(audio.as_nanos() - 2_500_000);
        assert_eq!(decide(behind_at, audio, ms_period()), SyncDecision::Continue);

        let behind_past = TimeNs(audio.as_nanos() - 2_500_001);
        assert_eq!(
            decide(behind_past, audio, ms_period()),
            SyncDecision::ResyncBehind { by_ns: 2_500_001 }
        );
    }

    #[test]
    fn test_first_tick_continues() {
        let period = FramePeriod::new(512, 48_000).unwrap();
        let mut clock = ClockState::new();

        let r = clock.advance(0.02, TimeNs::ZERO, period);

        assert_eq!(r.decision, SyncDecision::Continue);
        assert!(!r.was_reset());
        assert_eq!(r.time, TimeNs(20_000_000));
        assert_eq!(clock.last_estimated(), TimeNs(20_000_000));
    }

    #[test]
    fn test_long_pause_resyncs_ahead() {
        let period = FramePeriod::new(512, 48_000).unwrap();
        let mut clock = ClockState::starting_at(TimeNs(4_000_000_000));

        let r = clock.advance(1.0, TimeNs::ZERO, period);

        assert!(r.was_reset());
        assert_eq!(
            r.decision,
            SyncDecision::ResyncAhead {
                by_ns: 5_000_000_000 - 10_666_666
            }
        );
        assert_eq!(clock.last_estimated(), TimeNs(10_666_666));
        assert_eq!(clock.resyncs(), 1);
    }

    #[test]
    fn test_stalled_tick_resyncs_behind() {
        let period = ms_period();
        let mut clock = ClockState::new();

        let r = clock.advance(0.001, TimeNs::from_millis(100), period);

        assert_eq!(r.decision, SyncDecision::ResyncBehind { by_ns: 100_000_000 });
        assert_eq!(r.time, TimeNs::from_millis(101));
        assert_eq!(
            r.warnings().collect::<Vec<_>>(),
            vec![DriftWarning::Behind { by_ns: 100_000_000 }]
        );
    }

    #[test]
    fn test_resync_reported_in_ns() {
        let decision = SyncDecision::ResyncBehind { by_ns: 100_000_000 };
        assert_eq!(decision.divergence_ns(), 100_000_000);
        assert_eq!(SyncDecision::Continue.divergence_ns(), 0);
        assert_eq!(
            decision.warning().map(|w| w.to_string()),
            Some("component behind audio by 100000000 ns".to_string())
        );
    }

    #[test]
    fn test_zero_delta_still_reconciles() {
        let period = ms_period();
        let mut clock = ClockState::starting_at(TimeNs::from_millis(1));

        let r = clock.advance(0.0, TimeNs::ZERO, period);

        assert_eq!(r.delta_warning, Some(DriftWarning::ZeroDelta));
        assert_eq!(r.decision, SyncDecision::Continue);
        assert_eq!(r.time, TimeNs::from_millis(1));
    }

    #[test]
    fn test_resync_replaces_not_blends() {
        let period = ms_period();
        let mut clock = ClockState::starting_at(TimeNs::from_millis(500));
        let r = clock.advance(0.01, TimeNs::from_millis(200), period);
        assert_eq!(r.time, TimeNs::from_millis(201));
    }

    #[test]
    fn test_reset_discards_state() {
        let mut clock = ClockState::new();
        clock.advance(0.5, TimeNs::ZERO, ms_period());
        assert!(clock.ticks() > 0);
        clock.reset();
        assert_eq!(clock.last_estimated(), TimeNs::ZERO);
        assert_eq!(clock.ticks(), 0);
        assert_eq!(clock.resyncs(), 0);
    }

    proptest! {
        #[test]
        fn prop_positive_delta_strictly_increases(
            start in 0u64..1_000_000_000_000,
            deltas in proptest::collection::vec(1e-6f64..0.25, 1..50),
        ) {
            // A huge frame period keeps every tick inside the threshold
            let period = FramePeriod::from_nanos(u64::MAX / 8);
            let mut clock = ClockState::starting_at(TimeNs(start));
            for delta in deltas {
                let before = clock.last_estimated();
                let r = clock.advance(delta, TimeNs(start), period);
                prop_assert!(!r.was_reset());
                prop_assert!(clock.last_estimated() > before);
            }
        }

        #[test]
        fn prop_resync_lands_on_audio_next(
            last in 0u64..10_000_000_000,
            audio in 0u64..10_000_000_000,
            delta in 0.0f64..0.1,
        ) {
            let period = FramePeriod::from_nanos(1_000_000);
            let mut clock = ClockState::starting_at(TimeNs(last));
            let r = clock.advance(delta, TimeNs(audio), period);
            if r.was_reset() {
                prop_assert_eq!(r.time, TimeNs(audio + 1_000_000));
            } else {
                prop_assert!(r.time.abs_diff(TimeNs(audio + 1_000_000)) <= 2_500_000);
            }
        }
    }
}
