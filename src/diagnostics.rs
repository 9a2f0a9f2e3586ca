//! Runtime diagnostics for Swarmatron.
//!
//! Nothing in the synth is fatal. A failed sensor read leaves the previous
//! value in place and a torn snapshot is skipped. A failed output write drops
//! one block, and a codec or probe failure at setup leaves that part out.
//! Each of these is counted here so the drain task can report it,
//! and the most recent one is kept with its code and data.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Codes for the last recorded fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault recorded.
    None = 0,

    /// A sensor read failed on the bus. Data: sensor index.
    SensorRead = 1,

    /// Probe found no sensors. Output stays silent.
    NoSensors = 2,

    /// The audio output write failed. Data: consecutive failures.
    OutputWrite = 3,

    /// The engine saw a snapshot mid-update and kept the previous one.
    TornSnapshot = 4,

    /// Probing an address failed with a bus error. Data: I2C address.
    ProbeFailed = 5,

    /// Codec setup failed. Data: `Es8311Error` discriminant.
    CodecInit = 6,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::SensorRead,
            2 => FaultCode::NoSensors,
            3 => FaultCode::OutputWrite,
            4 => FaultCode::TornSnapshot,
            5 => FaultCode::ProbeFailed,
            6 => FaultCode::CodecInit,
            _ => FaultCode::None,
        }
    }
}

/// Lock-free counters shared by the poller, the audio loop and the drain task.
///
/// # Usage
///
/// ```ignore
/// static DIAGNOSTICS: Diagnostics = Diagnostics::new();
///
/// // In the poller:
/// if sensor.read(&mut bus).is_err() {
///     DIAGNOSTICS.record(FaultCode::SensorRead, index as u32);
/// }
///
/// // In the drain task:
/// let snap = DIAGNOSTICS.snapshot();
/// ```
pub struct Diagnostics {
    /// Code of the most recent fault.
    last_code: AtomicU8,

    /// Data attached to the most recent fault.
    last_data: AtomicU32,

    /// Completed poll iterations.
    polls: AtomicU32,

    /// Failed sensor reads.
    read_failures: AtomicU32,

    /// Snapshots skipped because they were mid-update.
    torn_snapshots: AtomicU32,

    /// Failed output writes.
    output_errors: AtomicU32,

    /// Probe and codec failures during setup.
    setup_errors: AtomicU32,
}

impl Diagnostics {
    /// Create empty diagnostics.
    pub const fn new() -> Self {
        Self {
            last_code: AtomicU8::new(0),
            last_data: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            read_failures: AtomicU32::new(0),
            torn_snapshots: AtomicU32::new(0),
            output_errors: AtomicU32::new(0),
            setup_errors: AtomicU32::new(0),
        }
    }

    /// Record a fault and bump its counter.
    #[inline]
    pub fn record(&self, code: FaultCode, data: u32) {
        match code {
            FaultCode::SensorRead => {
                self.read_failures.fetch_add(1, Ordering::Relaxed);
            }
            FaultCode::TornSnapshot => {
                self.torn_snapshots.fetch_add(1, Ordering::Relaxed);
            }
            FaultCode::OutputWrite => {
                self.output_errors.fetch_add(1, Ordering::Relaxed);
            }
            FaultCode::ProbeFailed | FaultCode::CodecInit => {
                self.setup_errors.fetch_add(1, Ordering::Relaxed);
            }
            FaultCode::NoSensors | FaultCode::None => {}
        }
        self.last_data.store(data, Ordering::Release);
        self.last_code.store(code as u8, Ordering::Release);
    }

    /// Count one completed poll iteration.
    #[inline]
    pub fn poll_completed(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Code of the most recent fault.
    #[inline]
    pub fn last_code(&self) -> FaultCode {
        FaultCode::from_u8(self.last_code.load(Ordering::Acquire))
    }

    /// Get a snapshot of every counter.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            last_code: self.last_code(),
            last_data: self.last_data.load(Ordering::Acquire),
            polls: self.polls.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            torn_snapshots: self.torn_snapshots.load(Ordering::Relaxed),
            output_errors: self.output_errors.load(Ordering::Relaxed),
            setup_errors: self.setup_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of diagnostics at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub last_code: FaultCode,
    pub last_data: u32,
    pub polls: u32,
    pub read_failures: u32,
    pub torn_snapshots: u32,
    pub output_errors: u32,
    pub setup_errors: u32,
}
