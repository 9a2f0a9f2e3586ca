//! RT-safe logging for Swarmatron.
//!
//! # Architecture
//!
//! ```text
//! audio loop ─── rt_*! ──▶ RT_LOG_STREAM ─┐
//!                                          ├──▶ drain task ──▶ console
//! poller, setup ─ rt_*! ──▶ BG_LOG_STREAM ─┘
//! ```
//!
//! A log call formats into a `LogEntry` on the caller's stack and copies it
//! into a fixed ring slot. Nothing allocates or blocks; when a ring is full
//! the entry is counted and dropped. Only the drain task ever reads.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Maximum message length in bytes. Longer messages are truncated.
pub const MAX_MSG_LEN: usize = 96;

/// Default ring capacity (entries).
pub const LOG_BUFFER_SIZE: usize = 128;

/// Log level, most severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Upper-case label used by the drain.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// One formatted log line.
///
/// Implements `fmt::Write` so messages are formatted straight into it;
/// writes past [`MAX_MSG_LEN`] are cut off silently.
#[derive(Clone, Copy)]
pub struct LogEntry {
    pub timestamp_us: i64,
    pub level: LogLevel,
    len: u8,
    msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    /// Empty entry stamped with `timestamp_us` and `level`.
    pub const fn new(timestamp_us: i64, level: LogLevel) -> Self {
        Self {
            timestamp_us,
            level,
            len: 0,
            msg: [0; MAX_MSG_LEN],
        }
    }

    /// Message text.
    ///
    /// Truncation can split a multi-byte char; the text then stops before it.
    pub fn message(&self) -> &str {
        let bytes = &self.msg[..self.len as usize];
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            // valid_up_to() is always a char boundary
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let n = bytes.len().min(MAX_MSG_LEN - start);
        self.msg[start..start + n].copy_from_slice(&bytes[..n]);
        self.len += n as u8;
    }
}

impl fmt::Write for LogEntry {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes());
        Ok(())
    }
}

impl fmt::Display for LogEntry {
    /// `[timestamp_us] LEVEL: message`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:10}] {}: {}", self.timestamp_us, self.level.as_str(), self.message())
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct Slot {
    /// Set by the producer once `entry` is complete, cleared by the drain.
    ready: AtomicBool,
    entry: UnsafeCell<LogEntry>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            entry: UnsafeCell::new(LogEntry::new(0, LogLevel::Info)),
        }
    }
}

/// Bounded log ring: any number of producers, one drain.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    slots: [Slot; N],
    /// Next slot to reserve (producers).
    head: AtomicU32,
    /// Next slot to drain (consumer).
    tail: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: a slot's entry is written only by the producer that reserved it
// (CAS on `head`) and read only by the single drain after `ready` is set.
unsafe impl<const N: usize> Sync for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    /// Create an empty stream. `N` must be a power of two.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "LogStream capacity must be a power of 2");
        Self {
            slots: [const { Slot::new() }; N],
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue a finished entry. Returns `false` (and counts a drop) if full.
    pub fn push_entry(&self, entry: &LogEntry) -> bool {
        let mut head = self.head.load(Ordering::Relaxed);
        let reserved = loop {
            let tail = self.tail.load(Ordering::Acquire);
            if head.wrapping_sub(tail) >= N as u32 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self
                .head
                .compare_exchange_weak(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break head,
                Err(current) => head = current,
            }
        };

        let slot = &self.slots[reserved as usize & (N - 1)];
        // SAFETY: this producer owns the slot until `ready` is stored.
        unsafe { *slot.entry.get() = *entry };
        slot.ready.store(true, Ordering::Release);
        true
    }

    /// Queue raw message bytes.
    pub fn push(&self, timestamp_us: i64, level: LogLevel, msg: &[u8]) -> bool {
        let mut entry = LogEntry::new(timestamp_us, level);
        entry.append(msg);
        self.push_entry(&entry)
    }

    /// Format and queue a message. This is what the `rt_*!` macros call.
    #[inline]
    pub fn log(&self, timestamp_us: i64, level: LogLevel, args: fmt::Arguments<'_>) -> bool {
        let mut entry = LogEntry::new(timestamp_us, level);
        let _ = fmt::write(&mut entry, args);
        self.push_entry(&entry)
    }

    /// Take the oldest entry.
    ///
    /// Returns `None` when empty, or when the oldest slot is reserved but
    /// its producer has not finished writing it yet.
    pub fn drain(&self) -> Option<LogEntry> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        let slot = &self.slots[tail as usize & (N - 1)];
        if !slot.ready.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: single drain, and `ready` hands the slot over from its producer.
        let entry = unsafe { *slot.entry.get() };
        slot.ready.store(false, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Entries dropped because the ring was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Read and reset the dropped counter.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    /// Entries reserved but not yet drained.
    pub fn pending(&self) -> u32 {
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(self.tail.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn has_entries(&self) -> bool {
        self.pending() != 0
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Written by the audio loop only.
pub static RT_LOG_STREAM: LogStream = LogStream::new();

/// Poller, setup and teardown.
pub static BG_LOG_STREAM: LogStream = LogStream::new();

/// Write every pending entry of `stream` to `out`, one per line, then a
/// warning line if anything was dropped since the last call.
///
/// Returns the number of entries written.
pub fn drain_to<W: fmt::Write, const N: usize>(stream: &LogStream<N>, out: &mut W) -> Result<usize, fmt::Error> {
    let mut written = 0;
    while let Some(entry) = stream.drain() {
        writeln!(out, "{}", entry)?;
        written += 1;
    }

    match stream.take_dropped() {
        0 => {}
        n => writeln!(out, "[{:>10}] WARN: {} log messages dropped", "", n)?,
    }

    Ok(written)
}

/// Log at an explicit level: `rt_log!(level, stream, timestamp_us, fmt, args..)`.
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $stream.log($timestamp, $level, format_args!($($arg)*))
    };
}

/// `rt_info!(stream, timestamp_us, fmt, args..)`
#[macro_export]
macro_rules! rt_info {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $stream, $timestamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_warn {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $stream, $timestamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_error {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $stream, $timestamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_debug {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Debug, $stream, $timestamp, $($arg)*)
    };
}

/// Per-frame detail; keep out of the audio loop unless chasing a bug.
#[macro_export]
macro_rules! rt_trace {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Trace, $stream, $timestamp, $($arg)*)
    };
}
