//! Module: touch
//!
//! Purpose: Touch reading types passed from the sensor poller to the engine.
//!
//! Architecture:
//! - `TouchReading`: the three compound values of one sensor at one poll
//! - `SensorSnapshot`: the readings of every discovered sensor, in probe order
//!
//! Safety: Safe. Copy types only.

use crate::config::MAX_SENSORS;

/// Compound touch values of one sensor.
///
/// Sizes are normalised so that a firm single-finger press is around 1.0.
/// Locations are normalised to 0..1 along the sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchReading {
    /// Sum of all touch sizes (0 = not touched)
    pub size: f32,
    /// Size-weighted mean of touch locations along the main axis
    pub location: f32,
    /// Size-weighted mean along the horizontal axis (2-D sensors only, else 0)
    pub horizontal_location: f32,
}

impl TouchReading {
    /// Reading of an untouched sensor.
    pub const RELEASED: Self = Self {
        size: 0.0,
        location: 0.0,
        horizontal_location: 0.0,
    };

    /// Whether the touch size exceeds `threshold`.
    #[inline]
    pub fn is_touched(&self, threshold: f32) -> bool {
        self.size > threshold
    }
}

/// Latest readings of every discovered sensor.
///
/// Index 0 is the first sensor found on the bus (the pitch bar), index 1
/// the second (the spread bar). Entries at `count..` are `RELEASED`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorSnapshot {
    /// Number of valid readings
    pub count: u8,
    /// Readings in probe order
    pub readings: [TouchReading; MAX_SENSORS],
}

impl SensorSnapshot {
    /// Snapshot with no sensors.
    pub const EMPTY: Self = Self {
        count: 0,
        readings: [TouchReading::RELEASED; MAX_SENSORS],
    };

    /// Reading of sensor `index`, if it exists.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&TouchReading> {
        if index < self.count as usize {
            self.readings.get(index)
        } else {
            None
        }
    }

    /// Build a snapshot from a slice of readings (extra readings are ignored).
    pub fn from_readings(readings: &[TouchReading]) -> Self {
        let mut snap = Self::EMPTY;
        let n = readings.len().min(MAX_SENSORS);
        snap.readings[..n].copy_from_slice(&readings[..n]);
        snap.count = n as u8;
        snap
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}
