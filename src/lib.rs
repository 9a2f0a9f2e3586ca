//! # Swarmatron
//!
//! Eight-voice square-wave swarm synth played on two Trill touch bars.
//!
//! ## Architecture
//!
//! ```text
//! Trill bars ──I2C──▶ SensorPoller ──▶ SnapshotCell ──▶ SynthEngine ──▶ I2S
//!                     (background)     (lock-free)      (audio loop)
//! ```
//!
//! - The poller and the engine share nothing but the snapshot cell
//! - The audio path never blocks, never allocates, and logs only via `rt_*!`
//! - Everything hardware-specific sits behind `embedded-hal` traits

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod envelope;
pub mod hal;
pub mod logging;
pub mod poller;
pub mod snapshot;
pub mod touch;
pub mod voice;

pub use config::{EnvelopeMode, SynthConfig, CONFIG};
pub use diagnostics::{Diagnostics, FaultCode};
pub use engine::SynthEngine;
pub use envelope::{Envelope, EnvelopeState};
pub use logging::{LogStream, BG_LOG_STREAM, RT_LOG_STREAM};
pub use poller::SensorPoller;
pub use snapshot::{SnapshotCell, SnapshotReader};
pub use touch::{SensorSnapshot, TouchReading};
pub use voice::VoiceBank;
