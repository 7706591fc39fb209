//! Transient detection and window-switching decisions
//!
//! The analysed region spans the second half of the previous block and the
//! whole new block. A transient in front of the transition region (the
//! boundary half a block into the new data) shrinks the subblock around it;
//! a transient inside the transition region only shortens the overlap.

use std::f32::consts::{FRAC_1_SQRT_2, LN_2, PI};

use crate::core::{UlcResult, WindowCtrl, MIN_OVERLAP, MIN_SUBBLOCK_SIZE};

use super::alloc_zeroed;

/// Instantaneous-to-smoothed energy ratio
const GAIN_RATIO: f32 = 0.25;

/// Smoothing of the envelope; -0.1dB/sample (10^(-0.1/20))
const SMOOTHNESS: f32 = 0.988_553_1;

/// Ratio (in log domain) a segment must exceed to be decimated: ln(4)
const DECIMATION_THRESHOLD: f32 = 1.386_294_4;

/// Stand-in for ln(0)
const MIN_LOG: f32 = -100.0;

/// In/Out ratio above which the overlap is cut to the minimum: 2^6.5
const MAX_SCALE_RATIO: f32 = 90.509_67;

/// Transient detector state carried across blocks
#[derive(Debug, Clone)]
pub struct TransientDetector {
    block_size: usize,
    /// Envelope of the previous block
    history: Vec<f32>,
    /// History followed by the new block's envelope
    envelope: Vec<f32>,
    /// Smoothed energy tap
    gain: f32,
}

/// Which segment held the largest energy step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Peak {
    Left,
    Middle,
    Right,
}

impl TransientDetector {
    pub fn new(block_size: usize) -> UlcResult<Self> {
        Ok(Self {
            block_size,
            history: alloc_zeroed(block_size)?,
            envelope: alloc_zeroed(2 * block_size)?,
            gain: 0.0,
        })
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.envelope.fill(0.0);
        self.gain = 0.0;
    }

    /// Smoothed transient envelope over history + new block
    pub fn envelope(&self) -> &[f32] {
        &self.envelope
    }

    /// Analyse a new planar block against the previous one and return the
    /// window code for the block that ends half-way through `data`
    pub fn analyze(
        &mut self,
        data: &[f32],
        previous: &[f32],
        channels: usize,
        window_switching: bool,
    ) -> WindowCtrl {
        self.filter(data, previous, channels);
        self.decide(window_switching)
    }

    /// Band-pass and smooth the new block into the envelope
    fn filter(&mut self, data: &[f32], previous: &[f32], channels: usize) {
        let n = self.block_size;
        let env = &mut self.envelope;

        env[..n].copy_from_slice(&self.history);

        // H(z) = z^1 - z^-1, squared and summed over channels. The last
        // sample of the previous block is recomputed now that its right
        // neighbour is known; the last new sample has to wait.
        env[n - 1] = 0.0;
        env[n..].fill(0.0);
        for ch in 0..channels {
            let old = &previous[ch * n..(ch + 1) * n];
            let new = &data[ch * n..(ch + 1) * n];
            env[n - 1] += (new[0] - old[n - 2]).powi(2);
            env[n] += (new[1] - old[n - 1]).powi(2);
            for k in 1..n - 1 {
                env[n + k] += (new[k + 1] - new[k - 1]).powi(2);
            }
        }

        // Difference between the instantaneous and the scaled smoothed
        // energy, weighted by the smoothed energy so built-up energy gets
        // dumped into a transient. The filter gain is roughly normalized out.
        let norm = 0.0625 / (channels * channels) as f32;
        let mut gain = self.gain;
        for e in &mut env[n - 1..2 * n - 1] {
            let v = *e * norm;
            let d = (v * GAIN_RATIO - gain).powi(2);
            gain = gain * SMOOTHNESS + v;
            *e = d * gain;
        }
        self.gain = gain;
        env[2 * n - 1] = 0.0;

        self.history.copy_from_slice(&env[n..]);
    }

    /// Binary decimation search and overlap scaling over the envelope
    fn decide(&self, window_switching: bool) -> WindowCtrl {
        let env = &self.envelope;
        let mut decimation = 1u8;
        let mut half = self.block_size / 2;
        let mut offset = half;

        loop {
            let (peak, ratio) = peak_step(env, offset, half);

            let can_decimate =
                window_switching && decimation < 0x8 && half > MIN_SUBBLOCK_SIZE / 2;
            if can_decimate && peak != Peak::Right && ratio >= DECIMATION_THRESHOLD {
                decimation <<= 1;
                if peak == Peak::Middle {
                    decimation |= 1;
                    offset += half;
                }
                half /= 2;
                continue;
            }
            break;
        }

        let scale = overlap_scale(&env[offset + half..offset + 3 * half], half);
        WindowCtrl::new(decimation, scale)
    }
}

/// Log-domain smooth maximum of a segment
fn smooth_max(seg: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    let mut weight = 0.0f32;
    for &x in seg {
        weight += x;
        if x != 0.0 {
            sum += x * x.ln();
        }
    }
    if weight > 0.0 {
        sum / weight
    } else {
        MIN_LOG
    }
}

/// Largest step between the LL/L/M/R segments around `offset`
fn peak_step(env: &[f32], offset: usize, half: usize) -> (Peak, f32) {
    let ll = smooth_max(&env[offset - half..offset]);
    let l = smooth_max(&env[offset..offset + half]);
    let m = smooth_max(&env[offset + half..offset + 2 * half]);
    let r = smooth_max(&env[offset + 2 * half..offset + 3 * half]);

    let mut best = (Peak::Left, l - ll);
    if m - l > best.1 {
        best = (Peak::Middle, m - l);
    }
    if r - m > best.1 {
        best = (Peak::Right, r - m);
    }
    best
}

/// Overlap reduction for a transient concentrated about the M/R boundary
///
/// `region` holds the M and R segments (`half` values each).
fn overlap_scale(region: &[f32], half: usize) -> u8 {
    let (mid, right) = region.split_at(half);
    let mut inside = 0.0f32;
    let mut outside = 0.0f32;
    for n in 0..half {
        // fades towards the boundary from both sides
        let c = (PI * (n as f32 + 0.5) / (2 * half) as f32).cos();
        let s = 1.0 - c;
        inside += s * mid[n] + c * right[n];
        outside += c * mid[n] + s * right[n];
    }

    // In/Out >= sqrt(2)
    if !(inside > 0.0) || inside * FRAC_1_SQRT_2 < outside {
        return 0;
    }
    let mut scale = if inside < outside * MAX_SCALE_RATIO {
        ((inside / outside).ln() / LN_2 + 0.5) as u8
    } else {
        7
    };
    while scale > 0 && (half >> scale) < MIN_OVERLAP / 2 {
        scale -= 1;
    }
    scale.min(7)
}
