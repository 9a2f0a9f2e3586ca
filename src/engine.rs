//! Module: engine
//!
//! Purpose: Per-frame synthesis. Turns sensor snapshots into the mono swarm
//! sample written to every output channel.
//!
//! Architecture:
//! - Every `control_period_frames` frames the engine pulls a snapshot and maps
//!   it onto fundamental, spread, voice amplitude and touch state
//! - Every frame it advances the [`VoiceBank`] and applies amplitude and the
//!   [`Envelope`] gain
//! - Logging goes through a [`LogStream`] with the RT-safe macros only
//!
//! Safety: RT-safe. No allocation, no blocking, no locks.

use crate::config::{ConfigError, EnvelopeMode, SynthConfig};
use crate::envelope::{Envelope, EnvelopeState};
use crate::logging::LogStream;
use crate::snapshot::SnapshotReader;
use crate::touch::{SensorSnapshot, TouchReading};
use crate::voice::VoiceBank;
use crate::{rt_debug, rt_info};

/// Index of the bar controlling pitch and amplitude.
pub const PITCH_SENSOR: usize = 0;

/// Index of the bar controlling spread.
pub const SPREAD_SENSOR: usize = 1;

/// Map a pitch bar location to the fundamental in Hz.
///
/// `((location + 1) * 100) / 2 + 111`, so 0..1 covers 161..211 Hz.
#[inline]
pub fn fundamental_for_location(location: f32) -> f32 {
    ((location + 1.0) * 100.0) / 2.0 + 111.0
}

/// A reading the engine can use: finite size and location, with the
/// location clamped to the bar (0..=1). Anything else is skipped and the
/// controls it would set keep their previous values.
fn sanitize(reading: &TouchReading) -> Option<TouchReading> {
    if !(reading.size.is_finite() && reading.location.is_finite()) {
        return None;
    }
    Some(TouchReading {
        location: reading.location.clamp(0.0, 1.0),
        ..*reading
    })
}

/// The swarm synth.
pub struct SynthEngine<'a> {
    config: SynthConfig,
    voices: VoiceBank,
    envelope: Envelope,
    log: &'a LogStream,

    sample_rate: u32,
    inv_sample_rate: f32,

    touched: bool,
    spread: f32,
    voice_amp: f32,

    /// Frames since the last snapshot.
    control_counter: u32,
    /// Frames spent ramping, for the periodic ramp log.
    ramp_counter: u32,
    /// Frames rendered since creation (log timestamps).
    frames: u64,
}

impl<'a> SynthEngine<'a> {
    /// Create an engine for `sample_rate` Hz, logging into `log`.
    pub fn new(config: SynthConfig, sample_rate: u32, log: &'a LogStream) -> Result<Self, ConfigError> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }

        rt_info!(log, 0, "ramp increment: {}", config.ramp_increment());

        Ok(Self {
            config,
            voices: VoiceBank::new(),
            envelope: Envelope::new(config.ramp_frames),
            log,
            sample_rate,
            inv_sample_rate: 1.0 / sample_rate as f32,
            touched: false,
            spread: 0.0,
            voice_amp: 0.0,
            control_counter: 0,
            ramp_counter: 0,
            frames: 0,
        })
    }

    /// Map a sensor snapshot onto the synth controls.
    pub fn apply_sensors(&mut self, snapshot: &SensorSnapshot) {
        let threshold = self.config.touch_threshold;
        let now = self.timestamp_us();

        if let Some(pitch) = snapshot.get(PITCH_SENSOR).and_then(sanitize) {
            if pitch.is_touched(threshold) {
                self.voices.set_fundamental(fundamental_for_location(pitch.location));
                self.voice_amp = pitch.size.clamp(0.0, 1.0);

                if !self.touched {
                    self.touched = true;
                    rt_info!(self.log, now, "touch moving to 1");
                    if self.config.envelope == EnvelopeMode::Gated && self.envelope.trigger() {
                        self.ramp_counter = 0;
                        rt_info!(self.log, now, "envelope moving to {:?}", self.envelope.state());
                    }
                }
            } else if self.touched {
                self.touched = false;
                rt_info!(self.log, now, "touch moving to 0");
                if self.config.envelope == EnvelopeMode::Gated && self.envelope.release() {
                    self.ramp_counter = 0;
                    rt_info!(self.log, now, "envelope moving to {:?}", self.envelope.state());
                }
            }
        }

        if let Some(spread) = snapshot.get(SPREAD_SENSOR).and_then(sanitize) {
            self.spread = if spread.is_touched(threshold) {
                spread.location
            } else {
                0.0
            };
        }

        self.voices.derive_frequencies(self.spread);
    }

    /// Render one frame, pulling a new snapshot when the control period ends.
    #[inline]
    pub fn next_frame(&mut self, sensors: &mut SnapshotReader<'_>) -> f32 {
        self.control_counter += 1;
        if self.control_counter >= self.config.control_period_frames {
            self.control_counter = 0;
            let snapshot = *sensors.load();
            self.apply_sensors(&snapshot);
        }
        self.process_frame()
    }

    /// Fill an interleaved buffer of `channels` channels.
    ///
    /// Every channel of a frame carries the same mono sample. A trailing
    /// partial frame is left untouched.
    pub fn render(&mut self, sensors: &mut SnapshotReader<'_>, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in out.chunks_exact_mut(channels) {
            let sample = self.next_frame(sensors);
            frame.fill(sample);
        }
    }

    /// Advance voices and envelope by one frame with the current controls.
    #[inline]
    pub fn process_frame(&mut self) -> f32 {
        let mix = self.voices.advance(self.inv_sample_rate);

        let gain = match self.config.envelope {
            EnvelopeMode::Gated => self.tick_envelope(),
            EnvelopeMode::Bypass => 1.0,
        };

        self.frames += 1;
        mix * self.voice_amp * gain
    }

    fn tick_envelope(&mut self) -> f32 {
        let before = self.envelope.state();
        let gain = self.envelope.tick();

        if matches!(before, EnvelopeState::Attack | EnvelopeState::Release) {
            self.ramp_counter += 1;
            let every = (self.config.ramp_frames / 10).max(1);
            if self.ramp_counter % every == 0 {
                rt_debug!(self.log, self.timestamp_us(), "ramp multiplier {}", gain);
            }
        }

        let after = self.envelope.state();
        if after != before {
            rt_info!(self.log, self.timestamp_us(), "envelope moving to {:?}", after);
        }

        gain
    }

    /// Silence the engine: envelope idle, phases zeroed, touch released.
    ///
    /// Frequencies and spread are kept so the next touch resumes in place.
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.voices.reset_phases();
        self.touched = false;
        self.voice_amp = 0.0;
        self.control_counter = 0;
        self.ramp_counter = 0;
    }

    /// Time of the current frame in microseconds since creation.
    #[inline]
    pub fn timestamp_us(&self) -> i64 {
        (self.frames * 1_000_000 / self.sample_rate as u64) as i64
    }

    /// Voice state.
    #[inline]
    pub fn voices(&self) -> &VoiceBank {
        &self.voices
    }

    /// Current envelope state.
    #[inline]
    pub fn envelope_state(&self) -> EnvelopeState {
        self.envelope.state()
    }

    /// Current ramp multiplier.
    #[inline]
    pub fn ramp_multiplier(&self) -> f32 {
        self.envelope.multiplier()
    }

    /// Fundamental frequency in Hz.
    #[inline]
    pub fn fundamental(&self) -> f32 {
        self.voices.fundamental()
    }

    /// Current spread.
    #[inline]
    pub fn spread(&self) -> f32 {
        self.spread
    }

    /// Current voice amplitude in [0, 1].
    #[inline]
    pub fn voice_amp(&self) -> f32 {
        self.voice_amp
    }

    /// Whether the pitch bar is currently touched.
    #[inline]
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Configuration the engine runs with.
    #[inline]
    pub fn config(&self) -> &SynthConfig {
        &self.config
    }
}
