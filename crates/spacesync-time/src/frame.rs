//! Frame period of the audio domain

use spacesync_core::{SyncError, SyncResult, TimeNs, NANOS_PER_SEC};

/// Nominal duration of one audio processing frame, in nanoseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramePeriod(u64);

impl FramePeriod {
    /// Compute `frame_length * 1e9 / sample_rate`, truncating toward zero.
    ///
    /// A zero sample rate or frame length is rejected instead of producing an
    /// undefined or zero period.
    pub fn new(frame_length_samples: u32, sample_rate_hz: u32) -> SyncResult<Self> {
        if sample_rate_hz == 0 {
            return Err(SyncError::ZeroSampleRate);
        }
        if frame_length_samples == 0 {
            return Err(SyncError::ZeroFrameLength);
        }
        let frame_length = frame_length_samples as u64;
        let numerator = frame_length
            .checked_mul(NANOS_PER_SEC)
            .ok_or(SyncError::FramePeriodOverflow { frame_length })?;
        Ok(FramePeriod(numerator / sample_rate_hz as u64))
    }

    /// Build from an already known period
    pub fn from_nanos(nanos: u64) -> Self {
        FramePeriod(nanos)
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Divergence beyond which the tick clock is resynchronized: 2.5 frames
    #[inline]
    pub fn resync_threshold(self) -> u64 {
        self.0.saturating_mul(2).saturating_add(self.0 / 2)
    }

    /// Audio time as of the next output frame
    #[inline]
    pub fn next_frame_after(self, audio_time: TimeNs) -> TimeNs {
        audio_time.saturating_add_nanos(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_512_at_48k() {
        let period = FramePeriod::new(512, 48_000).unwrap();
        assert_eq!(period.as_nanos(), 10_666_666);
    }

    #[test]
    fn test_period_exact() {
        assert_eq!(FramePeriod::new(480, 48_000).unwrap().as_nanos(), 10_000_000);
        assert_eq!(FramePeriod::new(1024, 44_100).unwrap().as_nanos(), 23_219_954);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let err = FramePeriod::new(512, 0).unwrap_err();
        assert_eq!(err, SyncError::ZeroSampleRate);
        assert!(err.is_configuration());
    }

    #[test]
    fn test_zero_frame_length_rejected() {
        assert_eq!(FramePeriod::new(0, 48_000).unwrap_err(), SyncError::ZeroFrameLength);
    }

    #[test]
    fn test_threshold_is_two_and_a_half_frames() {
        assert_eq!(FramePeriod::from_nanos(1_000_000).resync_threshold(), 2_500_000);
        // odd period: half frame truncates
        assert_eq!(FramePeriod::from_nanos(3).resync_threshold(), 7);
        assert_eq!(FramePeriod::new(512, 48_000).unwrap().resync_threshold(), 26_666_665);
    }

    #[test]
    fn test_next_frame_after() {
        let period = FramePeriod::from_nanos(10_000_000);
        assert_eq!(period.next_frame_after(TimeNs::ZERO), TimeNs(10_000_000));
    }
}
