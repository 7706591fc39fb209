#![allow(clippy::needless_range_loop)]

//! libulc: encoder core of the ULC lossy transform codec
//!
//! Planar float blocks go in, nybble-token bitstreams come out. Each block
//! runs through transient detection (window switching), a lapped MDCT with
//! MDST-assisted importance ranking, and one of three rate-control modes:
//!
//! - CBR: the largest coefficient cutoff that fits the block's bit budget
//! - ABR: CBR at a rate scaled by the block's complexity relative to the
//!   stream average
//! - VBR: a single pass at a cutoff derived from quality and complexity
//!
//! ```no_run
//! use libulc::{EncoderConfig, EncoderState};
//!
//! let mut encoder = EncoderState::new(EncoderConfig::new(44100, 2, 2048))?;
//! let block = vec![0.0f32; 2 * 2048];
//! let encoded = encoder.encode_block_cbr(&block, 128.0)?;
//! println!("{} bits", encoded.size_bits());
//! # Ok::<(), libulc::UlcError>(())
//! ```

pub mod core;
pub mod dsp;
pub mod encoder;

pub use core::{
    bitstream, DecimationPattern, EncoderConfig, NybbleReader, NybbleWriter, SubBlock, Token,
    UlcError, UlcResult, WindowCtrl, MAX_BLOCK_SIZE, MAX_CHANNELS, MIN_BLOCK_SIZE, MIN_CHANNELS,
};
pub use dsp::{ModulationWindow, PsychoacousticModel, WindowShape};
pub use encoder::{bit_budget, ComplexityAverager, EncodedBlock, EncoderState};
