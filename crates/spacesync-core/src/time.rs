//! Time primitives for SpaceSync
//!
//! Both clock domains are expressed in the same unit:
//! - the tick domain (host per-frame update, estimated)
//! - the audio domain (one value per audio buffer callback)
//!
//! All values are unsigned nanoseconds since the host's audio clock epoch.

use std::ops::{Add, Sub};
use std::time::Duration;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanosecond timestamp shared by the tick and audio domains
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeNs(pub u64);

impl TimeNs {
    pub const ZERO: TimeNs = TimeNs(0);
    pub const MAX: TimeNs = TimeNs(u64::MAX);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        TimeNs(nanos)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        TimeNs(millis.saturating_mul(1_000_000))
    }

    /// Convert seconds to nanoseconds by multiply-then-truncate.
    /// Negative and NaN inputs map to zero.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        TimeNs((secs * NANOS_PER_SEC as f64) as u64)
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    #[inline]
    pub fn saturating_add_nanos(self, nanos: u64) -> Self {
        TimeNs(self.0.saturating_add(nanos))
    }

    /// Apply a signed nanosecond offset, clamping at both ends of the range
    #[inline]
    pub fn saturating_add_signed(self, nanos: i64) -> Self {
        TimeNs(self.0.saturating_add_signed(nanos))
    }

    /// Absolute distance between two timestamps
    #[inline]
    pub fn abs_diff(self, other: TimeNs) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl Add<Duration> for TimeNs {
    type Output = TimeNs;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        TimeNs(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}

impl Sub<TimeNs> for TimeNs {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: TimeNs) -> Self::Output {
        Duration::from_nanos(self.0.saturating_sub(rhs.0))
    }
}

impl From<u64> for TimeNs {
    fn from(nanos: u64) -> Self {
        TimeNs(nanos)
    }
}

impl std::fmt::Debug for TimeNs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1_000_000.0)
    }
}

impl std::fmt::Display for TimeNs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
