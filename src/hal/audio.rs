//! Audio output settings and I2S sample packing.

/// Audio output configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOutputConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved output channels (the mono mix is copied to each)
    pub channels: usize,
    /// Frames rendered per I2S write
    pub block_frames: usize,
    /// Initial codec volume (0-100%)
    pub volume: u8,
}

impl AudioOutputConfig {
    /// Samples in one interleaved block.
    #[inline]
    pub const fn block_samples(&self) -> usize {
        self.block_frames * self.channels
    }

    /// Bytes in one block of 16-bit samples.
    #[inline]
    pub const fn block_bytes(&self) -> usize {
        self.block_samples() * 2
    }
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            block_frames: 64,
            volume: 70,
        }
    }
}

/// Convert a float sample in [-1, 1] to i16, saturating outside that range.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    (clamped * i16::MAX as f32) as i16
}

/// Pack float samples as little-endian i16 for the I2S driver.
///
/// Converts `min(samples.len(), out.len() / 2)` samples and returns the
/// number of bytes written.
pub fn encode_i16_le(samples: &[f32], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, bytes) in samples.iter().zip(out.chunks_exact_mut(2)) {
        bytes.copy_from_slice(&to_i16(*sample).to_le_bytes());
        written += 2;
    }
    written
}
