//! Lock-free sensor snapshot shared between the poller and the audio loop.
//!
//! # Architecture
//!
//! ```text
//! Poller ──publish()──▶ SnapshotCell ──try_load()──▶ Audio loop
//!          (writer)     (seq-counted)      (reader, never waits)
//! ```
//!
//! Every field is an atomic, so a concurrent read is never undefined
//! behaviour. The sequence counter is odd while a publish is in progress and
//! changes on every publish. A reader that sees an odd or changed sequence
//! discards what it read and keeps its previous snapshot.
//!
//! # Rules
//!
//! - One writer (the poller task)
//! - Readers never block and never retry in the RT path
//! - Floats travel as their bit patterns in `AtomicU32`

use core::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};

use crate::config::MAX_SENSORS;
use crate::diagnostics::{Diagnostics, FaultCode};
use crate::touch::{SensorSnapshot, TouchReading};

struct AtomicReading {
    size: AtomicU32,
    location: AtomicU32,
    horizontal_location: AtomicU32,
}

impl AtomicReading {
    const fn new() -> Self {
        Self {
            size: AtomicU32::new(0),
            location: AtomicU32::new(0),
            horizontal_location: AtomicU32::new(0),
        }
    }

    #[inline]
    fn store(&self, reading: &TouchReading) {
        self.size.store(reading.size.to_bits(), Ordering::Relaxed);
        self.location.store(reading.location.to_bits(), Ordering::Relaxed);
        self.horizontal_location
            .store(reading.horizontal_location.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> TouchReading {
        TouchReading {
            size: f32::from_bits(self.size.load(Ordering::Relaxed)),
            location: f32::from_bits(self.location.load(Ordering::Relaxed)),
            horizontal_location: f32::from_bits(self.horizontal_location.load(Ordering::Relaxed)),
        }
    }
}

/// Sequence-counted snapshot of every sensor reading.
pub struct SnapshotCell {
    /// Odd while a publish is in progress.
    seq: AtomicU32,

    /// Number of valid readings.
    count: AtomicU8,

    readings: [AtomicReading; MAX_SENSORS],
}

impl SnapshotCell {
    /// Create an empty cell (no sensors, sequence 0).
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            count: AtomicU8::new(0),
            readings: [const { AtomicReading::new() }; MAX_SENSORS],
        }
    }

    /// Publish a new snapshot (writer side).
    ///
    /// Must only be called from one task at a time.
    pub fn publish(&self, snapshot: &SensorSnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.count.store(snapshot.count, Ordering::Relaxed);
        for (slot, reading) in self.readings.iter().zip(snapshot.readings.iter()) {
            slot.store(reading);
        }

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read a consistent snapshot.
    ///
    /// Returns `None` if a publish was in progress or completed during the
    /// read. Never blocks.
    pub fn try_load(&self) -> Option<SensorSnapshot> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let mut snapshot = SensorSnapshot::EMPTY;
        snapshot.count = self.count.load(Ordering::Relaxed).min(MAX_SENSORS as u8);
        for (out, slot) in snapshot.readings.iter_mut().zip(self.readings.iter()) {
            *out = slot.load();
        }

        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        if before != after {
            return None;
        }

        Some(snapshot)
    }

    /// Number of completed publishes.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.seq.load(Ordering::Acquire) / 2
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of a [`SnapshotCell`] that remembers the last good snapshot.
///
/// A torn read falls back to the previous snapshot, which is exactly what a
/// stale sensor looks like to the engine.
pub struct SnapshotReader<'a> {
    cell: &'a SnapshotCell,
    diagnostics: Option<&'a Diagnostics>,
    last: SensorSnapshot,
}

impl<'a> SnapshotReader<'a> {
    /// Create a reader starting from an empty snapshot.
    pub fn new(cell: &'a SnapshotCell) -> Self {
        Self {
            cell,
            diagnostics: None,
            last: SensorSnapshot::EMPTY,
        }
    }

    /// Count skipped snapshots in `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: &'a Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Latest consistent snapshot (previous one if the cell is mid-update).
    #[inline]
    pub fn load(&mut self) -> &SensorSnapshot {
        match self.cell.try_load() {
            Some(snapshot) => self.last = snapshot,
            None => {
                if let Some(diag) = self.diagnostics {
                    diag.record(FaultCode::TornSnapshot, self.cell.generation());
                }
            }
        }
        &self.last
    }

    /// Last snapshot returned by [`load`](Self::load).
    #[inline]
    pub fn last(&self) -> &SensorSnapshot {
        &self.last
    }
}
