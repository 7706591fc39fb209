//! Modulation windows for the lapped transform
//!
//! Only the rising half of each window is stored: overlaps of `L` samples
//! fade in with `r[0..L]` and fade out with the same table reversed.

use std::f32::consts::PI;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::{UlcError, UlcResult, MIN_OVERLAP};

/// Window types for the lapped transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowShape {
    /// Sine window - simple, good for most content
    #[default]
    Sine,
    /// Vorbis window - steeper rolloff
    Vorbis,
    /// Kaiser-Bessel Derived - better frequency selectivity
    KaiserBesselDerived,
}

/// Rising window halves for every overlap size 16, 32, ..., block size
#[derive(Debug, Clone)]
pub struct ModulationWindow {
    block_size: usize,
    table: Vec<f32>,
}

impl ModulationWindow {
    /// Number of values a table for `block_size` holds
    pub fn table_len(block_size: usize) -> usize {
        2 * block_size - MIN_OVERLAP
    }

    /// Build the tables for a built-in shape
    pub fn new(shape: WindowShape, block_size: usize) -> Self {
        let mut table = Vec::with_capacity(Self::table_len(block_size));
        let mut len = MIN_OVERLAP;
        while len <= block_size {
            match shape {
                WindowShape::Sine => table.extend((0..len).map(|i| sine(i, len))),
                WindowShape::Vorbis => table.extend((0..len).map(|i| vorbis(i, len))),
                WindowShape::KaiserBesselDerived => table.extend(kbd_rising(len, 4.0)),
            }
            len *= 2;
        }
        Self { block_size, table }
    }

    /// Wrap a caller-supplied table
    ///
    /// Layout: `r16[16], r32[32], ..., rB[B]`. Each half should satisfy
    /// `r[i]^2 + r[L-1-i]^2 == 1` or the lapped transform will not cancel
    /// its aliasing.
    pub fn custom(block_size: usize, table: Vec<f32>) -> UlcResult<Self> {
        let expected = Self::table_len(block_size);
        if table.len() != expected {
            return Err(UlcError::InvalidWindow {
                expected,
                got: table.len(),
            });
        }

        let window = Self { block_size, table };
        let mut len = MIN_OVERLAP;
        while len <= block_size {
            let r = window.rising(len);
            let worst = (0..len)
                .map(|i| (r[i] * r[i] + r[len - 1 - i] * r[len - 1 - i] - 1.0).abs())
                .fold(0.0f32, f32::max);
            if !(worst < 1e-3) {
                warn!("custom modulation window of size {len} is not power complementary (error {worst})");
            }
            len *= 2;
        }
        Ok(window)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Rising half for an overlap of `len` samples (power of two, 16..=block size)
    pub fn rising(&self, len: usize) -> &[f32] {
        let len = len.clamp(MIN_OVERLAP, self.block_size);
        let offset = len - MIN_OVERLAP;
        &self.table[offset..offset + len]
    }

    /// Whole table in storage order
    pub fn as_slice(&self) -> &[f32] {
        &self.table
    }
}

/// sin(π(i+0.5)/2L)
fn sine(i: usize, len: usize) -> f32 {
    (PI * (i as f32 + 0.5) / (2 * len) as f32).sin()
}

/// sin(π/2 * sin²(π(i+0.5)/2L))
fn vorbis(i: usize, len: usize) -> f32 {
    let x = sine(i, len);
    (PI / 2.0 * x * x).sin()
}

/// First half of a 2L-point Kaiser-Bessel derived window
fn kbd_rising(len: usize, alpha: f32) -> Vec<f32> {
    let kaiser: Vec<f32> = (0..=len)
        .map(|i| {
            bessel_i0(PI * alpha * (1.0 - (2.0 * i as f32 / len as f32 - 1.0).powi(2)).sqrt())
        })
        .collect();

    let total: f32 = kaiser.iter().sum();
    let mut acc = 0.0f32;
    kaiser[..len]
        .iter()
        .map(|&k| {
            acc += k;
            (acc / total).sqrt()
        })
        .collect()
}

/// Modified Bessel function I0
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0f32;
    let mut term = 1.0f32;
    let x_sq = x * x / 4.0;

    for k in 1..50 {
        term *= x_sq / (k * k) as f32;
        sum += term;
        if term < 1e-10 * sum {
            break;
        }
    }

    sum
}
