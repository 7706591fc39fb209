//! Error type shared by every part of the encoder.

use std::collections::TryReserveError;

use thiserror::Error;

/// Encoder error
#[derive(Debug, Error)]
pub enum UlcError {
    /// Channel count outside 1..=255
    #[error("channel count {0} is outside 1..=255")]
    InvalidChannels(usize),

    /// Block size not a power of two in 64..=8192
    #[error("block size {0} must be a power of two in 64..=8192")]
    InvalidBlockSize(usize),

    /// Sample rate of zero
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,

    /// Rate-control constants that cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Modulation window table of the wrong size
    #[error("modulation window has {got} values, expected {expected}")]
    InvalidWindow { expected: usize, got: usize },

    /// Planar input block of the wrong size
    #[error("input block has {got} samples, expected {expected}")]
    InvalidInput { expected: usize, got: usize },

    /// Buffer reservation failed
    #[error("buffer allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// Configuration (de)serialization failed
    #[error("configuration json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the encoder
pub type UlcResult<T> = Result<T, UlcError>;
