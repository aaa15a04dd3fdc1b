//! Process-wide audio clock signal
//!
//! Written by the audio thread, read by the tick thread. No locks: the audio
//! time is a relaxed atomic (a stale read is tolerated by the resync
//! threshold), the availability counter is drained with a single swap.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use spacesync_core::TimeNs;

/// Audio time and completed-pass counter shared between both domains
#[derive(Debug, Default)]
pub struct AudioClockSignal {
    /// Most recent audio-domain time, nanoseconds
    audio_time: AtomicU64,
    /// Processing passes completed since the last consume
    pending_passes: AtomicU32,
}

impl AudioClockSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the audio time of the current callback.
    /// Returns the previously recorded time.
    #[inline]
    pub fn record_audio_time(&self, time: TimeNs) -> TimeNs {
        TimeNs(self.audio_time.swap(time.as_nanos(), Ordering::Relaxed))
    }

    /// Latest recorded audio time
    #[inline]
    pub fn audio_time(&self) -> TimeNs {
        TimeNs(self.audio_time.load(Ordering::Relaxed))
    }

    /// Producer side: one processing pass finished
    #[inline]
    pub fn mark_pass_complete(&self) {
        self.pending_passes.fetch_add(1, Ordering::Release);
    }

    /// Consumer side: passes completed since the last call, cleared atomically
    #[inline]
    pub fn consume_available_passes(&self) -> u32 {
        self.pending_passes.swap(0, Ordering::AcqRel)
    }

    /// Peek without consuming
    pub fn pending_passes(&self) -> u32 {
        self.pending_passes.load(Ordering::Acquire)
    }

    /// Return to the startup state
    pub fn clear(&self) {
        self.audio_time.store(0, Ordering::Relaxed);
        self.pending_passes.store(0, Ordering::Release);
    }
}

/// What the output stage should emit for the passes it just consumed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputAvailability {
    /// Nothing new was processed
    Silence,
    /// Exactly one pass, the steady state
    Ready,
    /// Output was not serviced often enough; only the latest buffer is used
    Overdue { passes: u32 },
}

impl OutputAvailability {
    pub fn from_passes(passes: u32) -> Self {
        match passes {
            0 => OutputAvailability::Silence,
            1 => OutputAvailability::Ready,
            passes => OutputAvailability::Overdue { passes },
        }
    }

    #[inline]
    pub fn has_output(self) -> bool {
        !matches!(self, OutputAvailability::Silence)
    }
}
