//! Background sensor poller.
//!
//! Owns the I2C bus and every discovered Trill, reads them at a fixed
//! interval and publishes the readings to a [`SnapshotCell`].
//!
//! # Contract
//!
//! - Runs at lower priority than audio, never touches engine state
//! - A failed read keeps that sensor's previous values (stale, not zeroed)
//! - Bus faults while probing are counted and the address is skipped
//! - Checks the stop flag once per iteration
//! - Dropping the poller (or [`SensorPoller::release`]) frees every driver

use core::ops::RangeInclusive;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::MAX_SENSORS;
use crate::diagnostics::{Diagnostics, FaultCode};
use crate::hal::trill::Trill;
use crate::logging::LogStream;
use crate::snapshot::SnapshotCell;
use crate::touch::{SensorSnapshot, TouchReading};
use crate::{rt_info, rt_warn};

/// Microsecond clock used for log timestamps.
pub type Clock = fn() -> i64;

/// Sensor poller over one I2C bus.
pub struct SensorPoller<'a, I> {
    bus: I,
    sensors: [Option<Trill>; MAX_SENSORS],
    count: usize,
    log: &'a LogStream,
    diagnostics: &'a Diagnostics,
    clock: Clock,
}

impl<'a, I: I2c> SensorPoller<'a, I> {
    /// Scan `addresses` and keep one driver per touch surface found.
    ///
    /// Probe failures are logged and skipped. Finding nothing is not an
    /// error: the poller then publishes empty snapshots and the synth stays
    /// silent.
    pub fn probe<D: DelayNs>(
        mut bus: I,
        delay: &mut D,
        addresses: RangeInclusive<u8>,
        log: &'a LogStream,
        diagnostics: &'a Diagnostics,
        clock: Clock,
    ) -> Self {
        let mut sensors: [Option<Trill>; MAX_SENSORS] = Default::default();
        let mut count = 0;

        for address in addresses {
            match Trill::probe(&mut bus, delay, address) {
                Ok(Some(trill)) => {
                    if count == MAX_SENSORS {
                        rt_warn!(log, clock(), "ignoring trill at 0x{:02x}: {} sensors max", address, MAX_SENSORS);
                        continue;
                    }
                    rt_info!(
                        log,
                        clock(),
                        "trill {} at 0x{:02x} ({}, firmware {})",
                        count,
                        address,
                        trill.device().as_str(),
                        trill.firmware()
                    );
                    sensors[count] = Some(trill);
                    count += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    rt_warn!(log, clock(), "probe 0x{:02x} failed: {:?}", address, e);
                    diagnostics.record(FaultCode::ProbeFailed, address as u32);
                }
            }
        }

        if count == 0 {
            rt_warn!(log, clock(), "no touch sensors found");
            diagnostics.record(FaultCode::NoSensors, 0);
        }

        Self {
            bus,
            sensors,
            count,
            log,
            diagnostics,
            clock,
        }
    }

    /// Number of sensors in use.
    #[inline]
    pub fn sensor_count(&self) -> usize {
        self.count
    }

    /// Sensors in probe order.
    pub fn sensors(&self) -> impl Iterator<Item = &Trill> {
        self.sensors.iter().flatten()
    }

    /// Read every sensor once and publish the result.
    ///
    /// Returns the number of successful reads.
    pub fn poll_once(&mut self, cell: &SnapshotCell) -> usize {
        let mut readings = [TouchReading::RELEASED; MAX_SENSORS];
        let mut ok = 0;

        for (index, slot) in self.sensors[..self.count].iter_mut().enumerate() {
            let Some(sensor) = slot.as_mut() else {
                continue;
            };
            match sensor.read(&mut self.bus) {
                Ok(reading) => {
                    readings[index] = reading;
                    ok += 1;
                }
                Err(_) => {
                    self.diagnostics.record(FaultCode::SensorRead, index as u32);
                    readings[index] = sensor.last_reading();
                }
            }
        }

        cell.publish(&SensorSnapshot::from_readings(&readings[..self.count]));
        self.diagnostics.poll_completed();
        ok
    }

    /// Poll until `stop` is set, sleeping `interval_us` between iterations.
    pub fn run<D: DelayNs>(&mut self, cell: &SnapshotCell, stop: &AtomicBool, delay: &mut D, interval_us: u32) {
        rt_info!(self.log, (self.clock)(), "poller started, {} sensors, {}us interval", self.count, interval_us);

        while !stop.load(Ordering::Acquire) {
            self.poll_once(cell);
            delay.delay_us(interval_us);
        }

        rt_info!(self.log, (self.clock)(), "poller stopped");
    }

    /// Drop every sensor driver and hand the bus back.
    pub fn release(self) -> I {
        self.bus
    }
}
