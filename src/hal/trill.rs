//! Trill capacitive touch sensor driver
//!
//! I2C control, centroid mode only.
//! Reference: Trill firmware command set (command offset 0, data offset 4).
//!
//! The driver does not own the bus. Every call borrows it, so several sensors
//! (and the codec) can share one I2C master.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::touch::TouchReading;

/// Trill register offsets and commands
mod regs {
    pub const OFFSET_COMMAND: u8 = 0x00;
    pub const OFFSET_DATA: u8 = 0x04;

    pub const CMD_MODE: u8 = 0x01;
    pub const CMD_SCAN_SETTINGS: u8 = 0x02;
    pub const CMD_BASELINE_UPDATE: u8 = 0x06;
    pub const CMD_IDENTIFY: u8 = 0x07;

    pub const MODE_CENTROID: u8 = 0x00;

    /// First byte of an identify response
    pub const IDENTIFY_TAG: u8 = 0xFE;

    /// Location value marking the end of the touch list
    pub const NO_TOUCH: u16 = 0xFFFF;
}

/// Wait after each command before the device accepts the next one
pub const COMMAND_DELAY_MS: u32 = 10;

/// Scan speed 0 (ultra fast) at 12-bit resolution
const SCAN_SPEED: u8 = 0;
const SCAN_RESOLUTION: u8 = 12;

/// Touches reported per axis by 1-D sensors
pub const MAX_TOUCHES_1D: usize = 5;
/// Touches reported per axis by 2-D sensors
pub const MAX_TOUCHES_2D: usize = 4;

/// Largest centroid frame (2-D: 4 locations + 4 sizes per axis, u16 each)
const MAX_FRAME_LEN: usize = MAX_TOUCHES_2D * 2 * 2 * 2;

/// Trill device family, as reported by identify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Unknown,
    Bar,
    Square,
    Craft,
    Ring,
    Hex,
    Flex,
}

impl Device {
    /// Decode the device type byte of an identify response.
    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Device::Bar,
            2 => Device::Square,
            3 => Device::Craft,
            4 => Device::Ring,
            5 => Device::Hex,
            6 => Device::Flex,
            _ => Device::Unknown,
        }
    }

    /// Human readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Unknown => "unknown",
            Device::Bar => "bar",
            Device::Square => "square",
            Device::Craft => "craft",
            Device::Ring => "ring",
            Device::Hex => "hex",
            Device::Flex => "flex",
        }
    }

    /// Whether the device reports a horizontal axis.
    #[inline]
    pub fn is_2d(self) -> bool {
        matches!(self, Device::Square | Device::Hex)
    }

    /// Whether the device produces centroids this driver can use.
    ///
    /// Craft boards expose raw channels only.
    #[inline]
    pub fn is_touch_surface(self) -> bool {
        !matches!(self, Device::Unknown | Device::Craft)
    }

    /// Raw-to-normalised divisors: (location, horizontal location, size)
    fn rescale(self) -> (f32, f32, f32) {
        match self {
            Device::Bar => (3200.0, 0.0, 4566.0),
            Device::Square => (1792.0, 1792.0, 3780.0),
            Device::Ring => (3584.0, 0.0, 5000.0),
            Device::Hex => (1920.0, 1664.0, 4000.0),
            Device::Flex => (3712.0, 0.0, 1200.0),
            Device::Craft => (4096.0, 0.0, 1.0),
            Device::Unknown => (1.0, 1.0, 1.0),
        }
    }

    /// Bytes in one centroid frame.
    #[inline]
    pub fn frame_len(self) -> usize {
        if self.is_2d() {
            MAX_TOUCHES_2D * 2 * 2 * 2
        } else {
            MAX_TOUCHES_1D * 2 * 2
        }
    }
}

/// Trill driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrillError {
    /// I2C communication error
    I2c,
    /// Identify response did not start with the 0xFE tag
    NotIdentified,
    /// Device answered but cannot report centroids
    UnsupportedDevice,
}

/// Ask the device at `address` what it is.
///
/// Returns `Ok(None)` for an address that does not acknowledge, which is the
/// normal result while scanning an empty bus.
pub fn identify<I: I2c, D: DelayNs>(
    i2c: &mut I,
    delay: &mut D,
    address: u8,
) -> Result<Option<(Device, u8)>, TrillError> {
    if i2c
        .write(address, &[regs::OFFSET_COMMAND, regs::CMD_IDENTIFY])
        .is_err()
    {
        return Ok(None);
    }
    delay.delay_ms(COMMAND_DELAY_MS);

    let mut buf = [0u8; 3];
    i2c.read(address, &mut buf).map_err(|_| TrillError::I2c)?;
    if buf[0] != regs::IDENTIFY_TAG {
        return Err(TrillError::NotIdentified);
    }

    Ok(Some((Device::from_id(buf[1]), buf[2])))
}

/// One Trill sensor on the bus.
#[derive(Debug, Clone)]
pub struct Trill {
    address: u8,
    device: Device,
    firmware: u8,
    last: TouchReading,
}

impl Trill {
    /// Probe `address` and, if a touch surface answers, put it in centroid mode.
    ///
    /// Returns `Ok(None)` if nothing usable is at that address.
    pub fn probe<I: I2c, D: DelayNs>(
        i2c: &mut I,
        delay: &mut D,
        address: u8,
    ) -> Result<Option<Self>, TrillError> {
        let Some((device, firmware)) = identify(i2c, delay, address)? else {
            return Ok(None);
        };
        if !device.is_touch_surface() {
            return Ok(None);
        }

        let mut trill = Self {
            address,
            device,
            firmware,
            last: TouchReading::RELEASED,
        };
        trill.init(i2c, delay)?;
        Ok(Some(trill))
    }

    /// Centroid mode, fast scan, fresh baseline.
    fn init<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<(), TrillError> {
        use regs::*;

        self.command(i2c, &[OFFSET_COMMAND, CMD_MODE, MODE_CENTROID])?;
        delay.delay_ms(COMMAND_DELAY_MS);

        self.command(i2c, &[OFFSET_COMMAND, CMD_SCAN_SETTINGS, SCAN_SPEED, SCAN_RESOLUTION])?;
        delay.delay_ms(COMMAND_DELAY_MS);

        self.command(i2c, &[OFFSET_COMMAND, CMD_BASELINE_UPDATE])?;
        delay.delay_ms(COMMAND_DELAY_MS);

        Ok(())
    }

    /// Read the latest centroid frame and update the cached reading.
    ///
    /// On error the cached reading is left as it was.
    pub fn read<I: I2c>(&mut self, i2c: &mut I) -> Result<TouchReading, TrillError> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = self.device.frame_len();
        i2c.write_read(self.address, &[regs::OFFSET_DATA], &mut buf[..len])
            .map_err(|_| TrillError::I2c)?;

        self.last = parse_centroids(self.device, &buf[..len])?;
        Ok(self.last)
    }

    /// Last successfully read values.
    #[inline]
    pub fn last_reading(&self) -> TouchReading {
        self.last
    }

    /// I2C address.
    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Device family.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Firmware version reported by identify.
    #[inline]
    pub fn firmware(&self) -> u8 {
        self.firmware
    }

    fn command<I: I2c>(&self, i2c: &mut I, bytes: &[u8]) -> Result<(), TrillError> {
        i2c.write(self.address, bytes).map_err(|_| TrillError::I2c)
    }
}

/// Compound values of one axis: (total size, size-weighted location).
///
/// `locations` and `sizes` are big-endian u16 arrays of the same length.
fn compound_axis(locations: &[u8], sizes: &[u8], loc_scale: f32, size_scale: f32) -> (f32, f32) {
    let mut total_size = 0.0f32;
    let mut weighted = 0.0f32;

    for (loc, size) in locations.chunks_exact(2).zip(sizes.chunks_exact(2)) {
        let loc = u16::from_be_bytes([loc[0], loc[1]]);
        if loc == regs::NO_TOUCH {
            break;
        }
        let size = u16::from_be_bytes([size[0], size[1]]) as f32 / size_scale;
        total_size += size;
        weighted += (loc as f32 / loc_scale) * size;
    }

    if total_size > 0.0 {
        (total_size, weighted / total_size)
    } else {
        (0.0, 0.0)
    }
}

/// Decode a centroid frame into compound touch values.
///
/// 1-D frame: `loc[5] size[5]`. 2-D frame: `loc[4] size[4]` for the vertical
/// axis followed by the same for the horizontal axis. On 2-D sensors the size
/// is taken from the vertical axis.
pub fn parse_centroids(device: Device, frame: &[u8]) -> Result<TouchReading, TrillError> {
    if !device.is_touch_surface() {
        return Err(TrillError::UnsupportedDevice);
    }
    if frame.len() < device.frame_len() {
        return Err(TrillError::I2c);
    }

    let (loc_scale, hloc_scale, size_scale) = device.rescale();

    if device.is_2d() {
        let axis = MAX_TOUCHES_2D * 2;
        let (v, h) = frame.split_at(axis * 2);
        let (size, location) = compound_axis(&v[..axis], &v[axis..], loc_scale, size_scale);
        let (_, horizontal_location) =
            compound_axis(&h[..axis], &h[axis..axis * 2], hloc_scale, size_scale);
        Ok(TouchReading { size, location, horizontal_location })
    } else {
        let axis = MAX_TOUCHES_1D * 2;
        let (size, location) = compound_axis(&frame[..axis], &frame[axis..axis * 2], loc_scale, size_scale);
        Ok(TouchReading { size, location, horizontal_location: 0.0 })
    }
}
