//! ES8311 audio codec driver
//!
//! I2C control only, the audio itself arrives over I2S.
//! The codec runs as I2S slave, DAC only, clocked from BCLK.
//! Reference: ES8311 datasheet / user guide register map.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

/// ES8311 I2C address (depends on CE pin)
pub const ES8311_ADDR: u8 = 0x18; // CE = LOW

/// Expected chip ID bytes (registers 0xFD, 0xFE)
pub const CHIP_ID: [u8; 2] = [0x83, 0x11];

/// Register addresses used by the DAC-only setup
mod regs {
    pub const RESET: u8 = 0x00;
    pub const CLK_MANAGER1: u8 = 0x01;
    pub const CLK_MANAGER2: u8 = 0x02;
    pub const CLK_MANAGER6: u8 = 0x06;
    pub const CLK_MANAGER7: u8 = 0x07;
    pub const CLK_MANAGER8: u8 = 0x08;
    pub const SDP_IN: u8 = 0x09;
    pub const SYSTEM_PWR: u8 = 0x0D;
    pub const SYSTEM_DAC_PWR: u8 = 0x12;
    pub const SYSTEM_HP: u8 = 0x13;
    pub const DAC_MUTE: u8 = 0x31;
    pub const DAC_VOL: u8 = 0x32;
    pub const DAC_RAMP: u8 = 0x37;
    pub const GP_REG: u8 = 0x45;
    pub const CHIP_ID1: u8 = 0xFD;
    pub const CHIP_ID2: u8 = 0xFE;
}

/// DAC mute bits in `DAC_MUTE`
const DAC_MUTE_BITS: u8 = 0x60;

/// `DAC_VOL` value for 0 dB; 0x00 is -95.5 dB in 0.5 dB steps
const DAC_VOL_0DB: u8 = 0xBF;

/// ES8311 configuration
#[derive(Debug, Clone)]
pub struct Es8311Config {
    /// Sample rate in Hz (8 kHz .. 96 kHz)
    pub sample_rate: u32,
    /// Initial DAC volume (0-100%)
    pub volume: u8,
}

impl Default for Es8311Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            volume: 70,
        }
    }
}

/// ES8311 driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Es8311Error {
    /// I2C communication error
    I2cError,
    /// Invalid configuration
    InvalidConfig,
    /// Chip not responding or wrong ID
    ChipNotFound,
}

/// ES8311 driver.
///
/// Borrows the bus per call so the same I2C master can be handed to the
/// sensor poller once the codec is configured.
pub struct Es8311 {
    config: Es8311Config,
    volume: u8,
    muted: bool,
}

impl Es8311 {
    /// Create new ES8311 driver
    pub fn new(config: Es8311Config) -> Self {
        Self {
            volume: config.volume.min(100),
            config,
            muted: false,
        }
    }

    /// Map 0-100% onto the DAC volume register (0% = -95.5 dB, 100% = 0 dB).
    pub fn volume_register(volume: u8) -> u8 {
        (volume.min(100) as u16 * DAC_VOL_0DB as u16 / 100) as u8
    }

    /// Verify the chip ID and run the DAC-only power-up sequence.
    pub fn init<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<(), Es8311Error> {
        use regs::*;

        if !(8_000..=96_000).contains(&self.config.sample_rate) {
            return Err(Es8311Error::InvalidConfig);
        }

        if self.chip_id(i2c)? != CHIP_ID {
            return Err(Es8311Error::ChipNotFound);
        }

        // Soft reset, then release in slave mode
        self.write_reg(i2c, RESET, 0x1F)?;
        delay.delay_ms(20);
        self.write_reg(i2c, RESET, 0x00)?;
        self.write_reg(i2c, GP_REG, 0x00)?;

        // MCLK derived from SCLK, all clocks on, dividers at 1
        self.write_reg(i2c, CLK_MANAGER1, 0xBF)?;
        self.write_reg(i2c, CLK_MANAGER2, 0x18)?;
        self.write_reg(i2c, CLK_MANAGER6, 0x03)?;
        self.write_reg(i2c, CLK_MANAGER7, 0x00)?;
        self.write_reg(i2c, CLK_MANAGER8, 0xFF)?;

        // Power on in slave mode
        self.write_reg(i2c, RESET, 0x80)?;
        self.write_reg(i2c, SYSTEM_PWR, 0x01)?;
        self.write_reg(i2c, SYSTEM_DAC_PWR, 0x00)?;
        self.write_reg(i2c, SYSTEM_HP, 0x10)?;

        // Serial input: I2S, 16-bit
        self.write_reg(i2c, SDP_IN, 0x0C)?;
        self.write_reg(i2c, DAC_RAMP, 0x08)?;

        self.write_reg(i2c, DAC_MUTE, 0x00)?;
        self.write_reg(i2c, DAC_VOL, Self::volume_register(self.volume))?;
        self.muted = false;

        Ok(())
    }

    /// Read the two chip ID bytes.
    ///
    /// An address NACK means no chip is fitted; any other bus fault is an
    /// `I2cError`.
    pub fn chip_id<I: I2c>(&self, i2c: &mut I) -> Result<[u8; 2], Es8311Error> {
        let missing = |e: I::Error| match e.kind() {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => Es8311Error::ChipNotFound,
            _ => Es8311Error::I2cError,
        };
        let id1 = self.read_reg(i2c, regs::CHIP_ID1).map_err(missing)?;
        let id2 = self.read_reg(i2c, regs::CHIP_ID2).map_err(missing)?;
        Ok([id1, id2])
    }

    /// Set DAC volume (0-100%)
    pub fn set_volume<I: I2c>(&mut self, i2c: &mut I, volume: u8) -> Result<(), Es8311Error> {
        self.volume = volume.min(100);
        self.write_reg(i2c, regs::DAC_VOL, Self::volume_register(self.volume))
    }

    /// Mute DAC output
    pub fn mute<I: I2c>(&mut self, i2c: &mut I, mute: bool) -> Result<(), Es8311Error> {
        let val = if mute { DAC_MUTE_BITS } else { 0x00 };
        self.write_reg(i2c, regs::DAC_MUTE, val)?;
        self.muted = mute;
        Ok(())
    }

    /// Get current volume
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Configured sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn write_reg<I: I2c>(&self, i2c: &mut I, reg: u8, val: u8) -> Result<(), Es8311Error> {
        i2c.write(ES8311_ADDR, &[reg, val])
            .map_err(|_| Es8311Error::I2cError)
    }

    fn read_reg<I: I2c>(&self, i2c: &mut I, reg: u8) -> Result<u8, I::Error> {
        let mut buf = [0u8; 1];
        i2c.write_read(ES8311_ADDR, &[reg], &mut buf)?;
        Ok(buf[0])
    }
}
