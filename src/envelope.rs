//! Attack/release ramp for the voice mix.
//!
//! Linear gain ramp used to fade the swarm in on touch and out on release
//! without clicks. The multiplier moves by a fixed step per frame and is
//! always clamped to [0, 1].

/// Envelope state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Output is zero
    Idle,
    /// Ramping up (0 → 1)
    Attack,
    /// Full gain
    Sustain,
    /// Ramping down (1 → 0)
    Release,
}

/// Ramp envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    state: EnvelopeState,
    multiplier: f32,
    increment: f32,
}

impl Envelope {
    /// Create an idle envelope with a ramp of `ramp_frames` frames.
    pub fn new(ramp_frames: u32) -> Self {
        Self {
            state: EnvelopeState::Idle,
            multiplier: 0.0,
            increment: 1.0 / ramp_frames.max(1) as f32, // Avoid div by zero
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current ramp multiplier.
    #[inline]
    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    /// Whether the envelope is producing non-zero gain or about to.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    /// Touch went down: ramp up from wherever the gain currently is.
    ///
    /// Returns `true` if the state changed.
    pub fn trigger(&mut self) -> bool {
        match self.state {
            EnvelopeState::Idle | EnvelopeState::Release => {
                self.state = EnvelopeState::Attack;
                true
            }
            EnvelopeState::Attack | EnvelopeState::Sustain => false,
        }
    }

    /// Touch went up: ramp down from wherever the gain currently is.
    ///
    /// Returns `true` if the state changed.
    pub fn release(&mut self) -> bool {
        match self.state {
            EnvelopeState::Attack | EnvelopeState::Sustain => {
                self.state = EnvelopeState::Release;
                true
            }
            EnvelopeState::Idle | EnvelopeState::Release => false,
        }
    }

    /// Advance one frame and return the gain to apply to it.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => {
                self.multiplier = 0.0;
            }
            EnvelopeState::Attack => {
                self.multiplier += self.increment;
                if self.multiplier >= 1.0 {
                    self.multiplier = 1.0;
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                self.multiplier = 1.0;
            }
            EnvelopeState::Release => {
                self.multiplier -= self.increment;
                if self.multiplier <= 0.0 {
                    self.multiplier = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
        }
        self.multiplier
    }

    /// Return to idle with zero gain.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.multiplier = 0.0;
    }
}
