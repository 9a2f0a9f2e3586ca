//! Hardware Abstraction Layer for Swarmatron.
//!
//! Drivers written against the `embedded-hal` traits, so the same code runs
//! on the ESP-IDF I2C master and on a scripted bus in tests.
//! Business logic stays in core modules, HAL is just I/O.

pub mod audio;
pub mod es8311;
pub mod trill;

pub use audio::{encode_i16_le, to_i16, AudioOutputConfig};
pub use es8311::{Es8311, Es8311Config, Es8311Error, ES8311_ADDR};
pub use trill::{Device, Trill, TrillError};
