//! Encoder session configuration

use serde::{Deserialize, Serialize};

use super::error::{UlcError, UlcResult};
use super::types::{MAX_BLOCK_SIZE, MAX_CHANNELS, MIN_BLOCK_SIZE, MIN_CHANNELS};
use crate::dsp::window::WindowShape;

/// Default ABR exponent (close to ln(15)/sqrt(2), found by ear)
pub const DEFAULT_ABR_EXPONENT: f32 = 1.9;

/// Default VBR complexity curve constant
pub const DEFAULT_VBR_CURVE: f32 = 15.0;

/// Parameters fixed for the lifetime of an encoder session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Playback rate in Hz (used for rate control)
    pub sample_rate: u32,
    /// Channels in the coding scheme; two channels are coded as M/S
    pub channels: usize,
    /// Transform block size
    pub block_size: usize,
    /// Shape of the built-in modulation window
    pub window_shape: WindowShape,
    /// Rank coefficients with masking corrections
    pub use_psychoacoustics: bool,
    /// Code insignificant runs as noise where it pays off
    pub use_noise_fill: bool,
    /// Allow subblock decimation on transients
    pub use_window_switching: bool,
    /// Exponent applied to the complexity ratio in ABR mode
    pub abr_exponent: f32,
    /// Scale of the quality-to-complexity curve in VBR mode
    pub vbr_curve: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            block_size: 2048,
            window_shape: WindowShape::Sine,
            use_psychoacoustics: true,
            use_noise_fill: true,
            use_window_switching: true,
            abr_exponent: DEFAULT_ABR_EXPONENT,
            vbr_curve: DEFAULT_VBR_CURVE,
        }
    }
}

impl EncoderConfig {
    /// Config with the given stream layout and default coding options
    pub fn new(sample_rate: u32, channels: usize, block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            block_size,
            ..Self::default()
        }
    }

    /// Check every parameter without touching any state
    pub fn validate(&self) -> UlcResult<()> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&self.channels) {
            return Err(UlcError::InvalidChannels(self.channels));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
            || !self.block_size.is_power_of_two()
        {
            return Err(UlcError::InvalidBlockSize(self.block_size));
        }
        if self.sample_rate == 0 {
            return Err(UlcError::InvalidSampleRate);
        }
        if !self.abr_exponent.is_finite() || self.abr_exponent < 0.0 {
            return Err(UlcError::InvalidConfig(format!(
                "abr_exponent {} must be finite and non-negative",
                self.abr_exponent
            )));
        }
        if !self.vbr_curve.is_finite() || self.vbr_curve <= 0.0 {
            return Err(UlcError::InvalidConfig(format!(
                "vbr_curve {} must be finite and positive",
                self.vbr_curve
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> UlcResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> UlcResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Coefficients per block across all channels
    pub fn coefficients_per_block(&self) -> usize {
        self.channels * self.block_size
    }
}
