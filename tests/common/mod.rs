//! Shared test doubles: a scripted I2C bus and no-op delays.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError(pub ErrorKind);

impl i2c::Error for MockError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Simulated device behind one address.
pub enum MockDevice {
    Trill {
        device_id: u8,
        firmware: u8,
        frame: Vec<u8>,
        identify_pending: bool,
        fail_reads: bool,
    },
    Codec {
        regs: [u8; 256],
        pointer: u8,
        fail_reads: bool,
    },
    /// Acknowledges everything, reads back zeros
    Blank,
}

#[derive(Default)]
pub struct BusState {
    pub devices: HashMap<u8, MockDevice>,
    /// Every write, in order: (address, bytes)
    pub writes: Vec<(u8, Vec<u8>)>,
}

/// Cloneable handle to a simulated I2C bus.
#[derive(Clone, Default)]
pub struct MockBus {
    pub state: Rc<RefCell<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Trill answering identify with `device_id`.
    pub fn add_trill(&self, address: u8, device_id: u8) {
        let frame_len = if device_id == 2 || device_id == 5 { 32 } else { 20 };
        self.state.borrow_mut().devices.insert(
            address,
            MockDevice::Trill {
                device_id,
                firmware: 3,
                frame: no_touch_frame(frame_len),
                identify_pending: false,
                fail_reads: false,
            },
        );
    }

    /// Add an ES8311 with the given chip ID.
    pub fn add_codec(&self, address: u8, chip_id: [u8; 2]) {
        let mut regs = [0u8; 256];
        regs[0xFD] = chip_id[0];
        regs[0xFE] = chip_id[1];
        self.state
            .borrow_mut()
            .devices
            .insert(address, MockDevice::Codec { regs, pointer: 0, fail_reads: false });
    }

    /// Set the centroid frame a Trill will return next.
    pub fn set_frame(&self, address: u8, new_frame: Vec<u8>) {
        if let Some(MockDevice::Trill { frame, .. }) = self.state.borrow_mut().devices.get_mut(&address) {
            *frame = new_frame;
        }
    }

    /// Add a device that acknowledges but answers nothing sensible.
    pub fn add_blank(&self, address: u8) {
        self.state.borrow_mut().devices.insert(address, MockDevice::Blank);
    }

    /// Make data reads from a Trill or codec fail (or succeed again).
    pub fn set_fail_reads(&self, address: u8, fail: bool) {
        match self.state.borrow_mut().devices.get_mut(&address) {
            Some(MockDevice::Trill { fail_reads, .. }) | Some(MockDevice::Codec { fail_reads, .. }) => {
                *fail_reads = fail;
            }
            _ => {}
        }
    }

    /// Current value of a codec register.
    pub fn codec_reg(&self, address: u8, reg: u8) -> Option<u8> {
        match self.state.borrow().devices.get(&address) {
            Some(MockDevice::Codec { regs, .. }) => Some(regs[reg as usize]),
            _ => None,
        }
    }

    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

impl ErrorType for MockBus {
    type Error = MockError;
}

impl I2c for MockBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        let BusState { devices, writes } = &mut *state;

        let Some(device) = devices.get_mut(&address) else {
            return Err(MockError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
        };

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    writes.push((address, bytes.to_vec()));
                    match device {
                        MockDevice::Trill { identify_pending, .. } => {
                            if bytes[..] == [0x00, 0x07] {
                                *identify_pending = true;
                            }
                        }
                        MockDevice::Codec { regs, pointer, .. } => match bytes.len() {
                            1 => *pointer = bytes[0],
                            2 => regs[bytes[0] as usize] = bytes[1],
                            _ => {}
                        },
                        MockDevice::Blank => {}
                    }
                }
                Operation::Read(buf) => match device {
                    MockDevice::Trill {
                        device_id,
                        firmware,
                        frame,
                        identify_pending,
                        fail_reads,
                    } => {
                        if *identify_pending {
                            *identify_pending = false;
                            let resp = [0xFE, *device_id, *firmware];
                            let n = buf.len().min(3);
                            buf[..n].copy_from_slice(&resp[..n]);
                        } else if *fail_reads {
                            return Err(MockError(ErrorKind::Bus));
                        } else {
                            let n = buf.len().min(frame.len());
                            buf[..n].copy_from_slice(&frame[..n]);
                        }
                    }
                    MockDevice::Codec { regs, pointer, fail_reads } => {
                        if *fail_reads {
                            return Err(MockError(ErrorKind::Bus));
                        }
                        for b in buf.iter_mut() {
                            *b = regs[*pointer as usize];
                        }
                    }
                    MockDevice::Blank => buf.fill(0),
                },
            }
        }
        Ok(())
    }
}

/// Frame with every location at 0xFFFF (no touches).
pub fn no_touch_frame(len: usize) -> Vec<u8> {
    vec![0xFF; len]
}

/// 1-D bar frame with a single touch (raw location and size).
pub fn bar_touch_frame(location: u16, size: u16) -> Vec<u8> {
    let mut frame = no_touch_frame(20);
    frame[0..2].copy_from_slice(&location.to_be_bytes());
    frame[10..12].copy_from_slice(&size.to_be_bytes());
    frame
}

/// Delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that raises `stop` after `remaining` calls.
pub struct StopAfter<'a> {
    pub remaining: u32,
    pub stop: &'a AtomicBool,
    pub calls: u32,
}

impl DelayNs for StopAfter<'_> {
    fn delay_ns(&mut self, _ns: u32) {
        self.calls += 1;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop.store(true, Ordering::Release);
        }
    }
}

pub fn zero_clock() -> i64 {
    0
}
