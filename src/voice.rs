//! Eight-voice square-wave bank.
//!
//! Voice 0 plays the fundamental. Voices 1-7 are detuned from it by a fixed
//! multiplier and the spread value:
//!
//! ```text
//! voices 1-4:  f0 / (mult / spread + 1)   (spread = 0 -> silent)
//! voices 5-7:  f0 / (mult * spread + 1)
//! ```
//!
//! Each voice advances a float phase accumulator wrapped to (-PI, PI] and
//! outputs the sign of its sine scaled by 1/8, so the mix of all eight never
//! leaves [-1, 1].

use core::f32::consts::{PI, TAU};

/// Number of voices in the bank.
pub const NUM_VOICES: usize = 8;

/// Per-voice output scale, so the full mix fits in [-1, 1].
pub const VOICE_SCALE: f32 = 1.0 / NUM_VOICES as f32;

/// Derived frequencies below this are silenced to avoid audible clicking.
pub const MIN_AUDIBLE_HZ: f32 = 20.0;

/// Spread multipliers (index 0 is unused, voice 0 is the fundamental).
pub const MULTIPLIERS: [f32; NUM_VOICES] = [0.0, 0.8, 0.75, 0.5, 0.25, 0.33, 0.66, 0.8];

/// Voices below this index divide the multiplier by the spread.
const DIVIDED_VOICES_END: usize = 5;

/// Frequency of voice `index` for a given fundamental and spread.
///
/// Voice 0 returns the fundamental unchanged. Any derived frequency under
/// [`MIN_AUDIBLE_HZ`] is exactly 0. A spread of zero (or NaN) silences the
/// divided voices instead of dividing by zero. An index past the bank is
/// silent.
pub fn derived_frequency(index: usize, fundamental: f32, spread: f32) -> f32 {
    if index == 0 {
        return fundamental;
    }

    let Some(&mult) = MULTIPLIERS.get(index) else {
        return 0.0;
    };
    let divisor = if index < DIVIDED_VOICES_END {
        if !(spread > 0.0) {
            return 0.0;
        }
        mult / spread + 1.0
    } else {
        mult * spread + 1.0
    };

    let freq = fundamental / divisor;
    if freq < MIN_AUDIBLE_HZ || freq.is_nan() {
        0.0
    } else {
        freq
    }
}

/// Wrap any phase into (-PI, PI]. Non-finite input restarts at 0.
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    if phase > -PI && phase <= PI {
        return phase;
    }
    if !phase.is_finite() {
        return 0.0;
    }

    // fmodf is exact, so this holds for arbitrarily large phases
    let mut turns = libm::fmodf(phase + PI, TAU);
    if turns <= 0.0 {
        turns += TAU;
    }
    let wrapped = turns - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Oscillator state of all voices.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceBank {
    /// Current frequency of each voice in Hz
    pub frequency: [f32; NUM_VOICES],
    /// Phase accumulator of each voice in (-PI, PI]
    pub phase: [f32; NUM_VOICES],
    /// `sin(phase)` of each voice at the last frame
    pub raw_output: [f32; NUM_VOICES],
    /// Square output of each voice at the last frame (+-VOICE_SCALE)
    pub square_output: [f32; NUM_VOICES],
}

impl VoiceBank {
    /// Create a silent bank with every phase at zero.
    pub const fn new() -> Self {
        Self {
            frequency: [0.0; NUM_VOICES],
            phase: [0.0; NUM_VOICES],
            raw_output: [0.0; NUM_VOICES],
            square_output: [0.0; NUM_VOICES],
        }
    }

    /// Fundamental frequency (voice 0).
    #[inline]
    pub fn fundamental(&self) -> f32 {
        self.frequency[0]
    }

    /// Set the fundamental frequency (voice 0).
    #[inline]
    pub fn set_fundamental(&mut self, freq_hz: f32) {
        self.frequency[0] = freq_hz;
    }

    /// Recompute voices 1-7 from the fundamental and `spread`.
    #[inline]
    pub fn derive_frequencies(&mut self, spread: f32) {
        let fundamental = self.frequency[0];
        for i in 1..NUM_VOICES {
            self.frequency[i] = derived_frequency(i, fundamental, spread);
        }
    }

    /// Advance every voice by one frame and return the summed square mix.
    ///
    /// `inv_sample_rate` is `1 / sample_rate`. The result lies in [-1, 1].
    #[inline]
    pub fn advance(&mut self, inv_sample_rate: f32) -> f32 {
        let mut mix = 0.0;
        for i in 0..NUM_VOICES {
            let phase = self.phase[i] + TAU * self.frequency[i] * inv_sample_rate;
            self.phase[i] = wrap_phase(phase);

            self.raw_output[i] = libm::sinf(self.phase[i]);
            self.square_output[i] = if self.raw_output[i] > 0.0 {
                VOICE_SCALE
            } else {
                -VOICE_SCALE
            };
            mix += self.square_output[i];
        }
        mix
    }

    /// Zero every phase and output, keeping frequencies.
    pub fn reset_phases(&mut self) {
        self.phase = [0.0; NUM_VOICES];
        self.raw_output = [0.0; NUM_VOICES];
        self.square_output = [0.0; NUM_VOICES];
    }
}

impl Default for VoiceBank {
    fn default() -> Self {
        Self::new()
    }
}
