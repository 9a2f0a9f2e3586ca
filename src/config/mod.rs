//! Module: config
//!
//! Purpose: Compile-time configuration for Swarmatron.
//!
//! Architecture:
//! - `SynthConfig`: one struct covering every tunable of the synth
//! - Three presets (`SWARM`, `FAST_POLL`, `DRONE`) for the known variants
//! - `CONFIG`: the preset selected by cargo feature at build time
//! - `AUDIO_TASK`, `POLLER_TASK`, `DRAIN_TASK`: firmware thread placement
//!
//! Safety: Safe. Plain `Copy` data, no interior mutability.

use core::ops::RangeInclusive;

/// Maximum number of touch sensors tracked by the poller and snapshot.
pub const MAX_SENSORS: usize = 4;

/// How the envelope gates the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// Touch on sensor 0 ramps the output in and out.
    Gated,
    /// Output runs unconditionally at unity gain.
    Bypass,
}

/// Synth configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthConfig {
    /// Sleep between poller iterations in microseconds
    pub poll_interval_us: u32,
    /// Audio frames between sensor snapshots
    pub control_period_frames: u32,
    /// Envelope behaviour
    pub envelope: EnvelopeMode,
    /// Length of the attack and release ramps in frames
    pub ramp_frames: u32,
    /// Touch size above which a sensor counts as touched
    pub touch_threshold: f32,
    /// First I2C address probed for sensors
    pub probe_first: u8,
    /// Last I2C address probed for sensors (inclusive)
    pub probe_last: u8,
    /// I2C bus number the sensors hang off
    pub i2c_bus: u8,
}

/// Configuration rejected by [`SynthConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Ramp length must be at least one frame
    ZeroRamp,
    /// Control period must be at least one frame
    ZeroControlPeriod,
    /// Poll interval must be non-zero
    ZeroPollInterval,
    /// `probe_first` is above `probe_last`
    EmptyProbeRange,
    /// Touch threshold is not a finite value in [0, 1)
    InvalidThreshold,
    /// Audio sample rate must be non-zero
    ZeroSampleRate,
}

impl SynthConfig {
    /// Two bars, 1.2ms polling, gated ramp.
    pub const SWARM: Self = Self {
        poll_interval_us: 1200,
        control_period_frames: 1200,
        envelope: EnvelopeMode::Gated,
        ramp_frames: 10_000,
        touch_threshold: 0.1,
        probe_first: 0x20,
        probe_last: 0x50,
        i2c_bus: 1,
    };

    /// Same as `SWARM` with the poller running twice as often.
    pub const FAST_POLL: Self = Self {
        poll_interval_us: 600,
        control_period_frames: 600,
        ..Self::SWARM
    };

    /// No envelope: voices sound whether or not the bar is touched.
    pub const DRONE: Self = Self {
        envelope: EnvelopeMode::Bypass,
        ..Self::SWARM
    };

    /// Ramp multiplier step applied per frame while ramping.
    #[inline]
    pub fn ramp_increment(&self) -> f32 {
        1.0 / self.ramp_frames as f32
    }

    /// Address range scanned at setup.
    #[inline]
    pub fn probe_range(&self) -> RangeInclusive<u8> {
        self.probe_first..=self.probe_last
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ramp_frames == 0 {
            return Err(ConfigError::ZeroRamp);
        }
        if self.control_period_frames == 0 {
            return Err(ConfigError::ZeroControlPeriod);
        }
        if self.poll_interval_us == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.probe_first > self.probe_last {
            return Err(ConfigError::EmptyProbeRange);
        }
        if !(self.touch_threshold >= 0.0 && self.touch_threshold < 1.0) {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        CONFIG
    }
}

/// Placement of one firmware thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// NUL-terminated thread name
    pub name: &'static str,
    /// FreeRTOS priority, higher runs first
    pub priority: u8,
    /// Core the thread is pinned to
    pub core: u8,
    pub stack_size: usize,
}

/// Audio loop: highest priority, alone on core 0.
pub const AUDIO_TASK: TaskConfig = TaskConfig {
    name: "audio\0",
    priority: 20,
    core: 0,
    stack_size: 8192,
};

/// Sensor poller: below audio, on core 1.
pub const POLLER_TASK: TaskConfig = TaskConfig {
    name: "poller\0",
    priority: 5,
    core: 1,
    stack_size: 8192,
};

/// Log drain: lowest, blocks on the console.
pub const DRAIN_TASK: TaskConfig = TaskConfig {
    name: "logdrain\0",
    priority: 2,
    core: 1,
    stack_size: 4096,
};

/// Preset compiled into the firmware.
#[cfg(feature = "variant-drone")]
pub const CONFIG: SynthConfig = SynthConfig::DRONE;

/// Preset compiled into the firmware.
#[cfg(all(feature = "variant-fast-poll", not(feature = "variant-drone")))]
pub const CONFIG: SynthConfig = SynthConfig::FAST_POLL;

/// Preset compiled into the firmware.
#[cfg(not(any(feature = "variant-fast-poll", feature = "variant-drone")))]
pub const CONFIG: SynthConfig = SynthConfig::SWARM;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert_eq!(SynthConfig::SWARM.validate(), Ok(()));
        assert_eq!(SynthConfig::FAST_POLL.validate(), Ok(()));
        assert_eq!(SynthConfig::DRONE.validate(), Ok(()));
    }

    #[test]
    fn test_fast_poll_only_changes_timing() {
        let fast = SynthConfig::FAST_POLL;
        assert_eq!(fast.poll_interval_us, 600);
        assert_eq!(fast.control_period_frames, 600);
        assert_eq!(fast.envelope, EnvelopeMode::Gated);
        assert_eq!(fast.ramp_frames, SynthConfig::SWARM.ramp_frames);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = SynthConfig::SWARM;
        cfg.ramp_frames = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRamp));

        let mut cfg = SynthConfig::SWARM;
        cfg.control_period_frames = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroControlPeriod));

        let mut cfg = SynthConfig::SWARM;
        cfg.poll_interval_us = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPollInterval));

        let mut cfg = SynthConfig::SWARM;
        cfg.probe_first = 0x51;
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyProbeRange));

        let mut cfg = SynthConfig::SWARM;
        cfg.touch_threshold = f32::NAN;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidThreshold));
    }

    #[test]
    fn test_audio_task_outranks_background_tasks() {
        assert!(AUDIO_TASK.priority > POLLER_TASK.priority);
        assert!(POLLER_TASK.priority > DRAIN_TASK.priority);
        assert_ne!(AUDIO_TASK.core, POLLER_TASK.core);
        assert_ne!(AUDIO_TASK.core, DRAIN_TASK.core);
        // Main task runs at priority 1 and must not preempt any of them
        assert!(DRAIN_TASK.priority > 1);
        // FreeRTOS default configMAX_PRIORITIES is 25
        assert!(AUDIO_TASK.priority < 25);
        for task in [AUDIO_TASK, POLLER_TASK, DRAIN_TASK] {
            assert!(task.name.ends_with('\0'));
        }
    }

    #[test]
    fn test_ramp_increment() {
        let cfg = SynthConfig::SWARM;
        assert!((cfg.ramp_increment() - 0.0001).abs() < 1e-9);
    }

    #[test]
    fn test_probe_range_covers_trill_addresses() {
        let range = SynthConfig::SWARM.probe_range();
        assert_eq!(*range.start(), 0x20);
        assert_eq!(*range.end(), 0x50);
        assert_eq!(range.count(), 49);
    }
}
