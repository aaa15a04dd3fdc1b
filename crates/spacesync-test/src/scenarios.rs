//! Host behaviour scenarios
//!
//! Presets for the ways a host tick loop drifts away from the audio clock,
//! plus the end-to-end checks that run them through the simulator.

use std::time::Duration;

use crate::{HostClockModel, SimConfig};

/// Named host behaviours
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostScenario {
    /// 60 Hz, honest deltas
    Steady,
    /// Reports 5% more time than really passed
    FastClock,
    /// Reports 5% less time than really passed
    SlowClock,
    /// 60 Hz with +-3 ms of delta jitter
    Jittery,
    /// Freezes for a second every 60 ticks, deltas clamped to 50 ms
    Stalling,
    /// Output callback runs at half the audio callback rate
    StarvedOutput,
}

impl HostScenario {
    pub const ALL: [HostScenario; 6] = [
        HostScenario::Steady,
        HostScenario::FastClock,
        HostScenario::SlowClock,
        HostScenario::Jittery,
        HostScenario::Stalling,
        HostScenario::StarvedOutput,
    ];

    pub fn config(self) -> SimConfig {
        let steady = HostClockModel::new(60.0);
        match self {
            HostScenario::Steady => SimConfig::new(steady),
            HostScenario::FastClock => SimConfig::new(steady.with_drift(1.05)),
            HostScenario::SlowClock => SimConfig::new(steady.with_drift(0.95)),
            HostScenario::Jittery => SimConfig {
                seed: 7,
                ..SimConfig::new(steady.with_jitter(3_000))
            },
            HostScenario::Stalling => {
                SimConfig::new(steady.with_stalls(60, Duration::from_secs(1), 0.05))
            }
            HostScenario::StarvedOutput => SimConfig {
                output_every: 2,
                ..SimConfig::new(steady)
            },
        }
    }
}
