//! Quantizer step selection and coefficient companding

use crate::core::{QUANTIZER_BIAS, QUANTIZER_MAX};

/// Largest companded coefficient magnitude
pub const MAX_COEF_MAGNITUDE: u8 = 7;

/// Quantizer index for a zone whose mean magnitude is `scale`
///
/// Chosen so that `scale * 2^qi` sits around 16, i.e. a companded
/// magnitude of about 4.
pub fn quantizer_index(scale: f32) -> u8 {
    let q = (4.0 - scale.log2()).ceil();
    if q.is_nan() {
        return QUANTIZER_MAX;
    }
    q.clamp(QUANTIZER_BIAS as f32, QUANTIZER_MAX as f32) as u8
}

/// Step multiplier for a quantizer index
pub fn step(index: u8) -> f32 {
    (1u32 << index) as f32
}

/// Square-root companded, saturating nybble for `value * q`
///
/// Magnitudes are clamped to 1..=7 (a coded coefficient is never zero);
/// negative values use two's complement, so `0x8` never appears.
pub fn quantize(value: f32, q: f32) -> u8 {
    let m = (value * q).abs().sqrt().round();
    let m = if m.is_nan() {
        1
    } else {
        m.clamp(1.0, MAX_COEF_MAGNITUDE as f32) as u8
    };
    if value < 0.0 {
        (16 - m) & 0xF
    } else {
        m
    }
}

