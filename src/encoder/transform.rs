//! Block transform and coefficient importance ranking
//!
//! Each call transforms the block held in the sample history, using the
//! lapping half of the block before it:
//!
//! ```text
//!   segment = lap (B/2) ++ history (B)
//!   core    = segment[0..B]            <- subblocks tile this region
//!   reads   = segment[0..B + Or/2]     <- right fade of the last subblock
//! ```
//!
//! The left fade of the first subblock was pre-windowed on the previous call
//! and is kept in the carry buffer.

use log::trace;

use crate::core::{UlcResult, WindowCtrl, COEF_EPS};
use crate::dsp::{LappedTransform, ModulationWindow, NoiseEstimator, PsychoacousticModel};

use super::alloc_zeroed;

/// Per-block results consumed by rate control and the bitstream encoder
#[derive(Debug, Clone)]
pub struct BlockAnalysis {
    /// Normalized MDCT coefficients, channel after channel, subblocks in order
    pub(crate) coefs: Vec<f32>,
    /// Smoothed log noise amplitude per coefficient
    pub(crate) noise: Vec<f32>,
    /// Importance rank per coefficient (0 = most important)
    pub(crate) ranks: Vec<u32>,
    /// Normalized spectral entropy in [0, 1]
    pub(crate) complexity: f32,
    /// Coefficients above the codeable floor
    pub(crate) usable: usize,
    /// Window code the block was transformed with
    pub(crate) window_ctrl: WindowCtrl,
}

impl BlockAnalysis {
    pub(crate) fn new(coefficients: usize) -> UlcResult<Self> {
        Ok(Self {
            coefs: alloc_zeroed(coefficients)?,
            noise: alloc_zeroed(coefficients)?,
            ranks: alloc_zeroed(coefficients)?,
            complexity: 0.0,
            usable: 0,
            window_ctrl: WindowCtrl::INITIAL,
        })
    }

    pub(crate) fn clear(&mut self) {
        self.coefs.fill(0.0);
        self.noise.fill(0.0);
        self.ranks.fill(0);
        self.complexity = 0.0;
        self.usable = 0;
        self.window_ctrl = WindowCtrl::INITIAL;
    }
}

/// Normalized (not orthogonal) mid/side downmix of a planar stereo block
pub fn mid_side(samples: &mut [f32], block_size: usize) {
    let (left, right) = samples.split_at_mut(block_size);
    for (l, r) in left.iter_mut().zip(right[..block_size].iter_mut()) {
        let (a, b) = (*l, *r);
        *l = (a + b) * 0.5;
        *r = (a - b) * 0.5;
    }
}

/// Lapped transform driver with its carried lapping state
pub struct BlockTransformer {
    block_size: usize,
    channels: usize,
    window: ModulationWindow,
    transform: LappedTransform,
    psycho: PsychoacousticModel,
    noise: NoiseEstimator,
    /// Raw second half of the previous block, per channel
    lap: Vec<f32>,
    /// Pre-windowed lead-in of the next block's first subblock, per channel
    carry: Vec<f32>,
    /// Overlap between the previous block's last subblock and this block
    lap_overlap: usize,
    /// lap ++ history for the channel being transformed
    segment: Vec<f32>,
    /// Windowed lead-in for subblocks after the first
    lead: Vec<f32>,
    /// MDST output of one subblock
    mdst: Vec<f32>,
    /// Power of one subblock
    power: Vec<f32>,
    /// Power accumulated over channels
    amp2: Vec<f32>,
    /// Masking correction shared by all channels
    masking: Vec<f32>,
    /// Importance keys
    keys: Vec<f32>,
    /// Coefficient indices in descending importance
    order: Vec<u32>,
}

impl BlockTransformer {
    pub fn new(
        sample_rate: u32,
        channels: usize,
        block_size: usize,
        window: ModulationWindow,
    ) -> UlcResult<Self> {
        let half = block_size / 2;
        let total = channels * block_size;
        Ok(Self {
            block_size,
            channels,
            window,
            transform: LappedTransform::new(block_size),
            psycho: PsychoacousticModel::new(sample_rate, block_size),
            noise: NoiseEstimator::new(block_size),
            lap: alloc_zeroed(channels * half)?,
            carry: alloc_zeroed(channels * half)?,
            lap_overlap: block_size,
            segment: alloc_zeroed(block_size + half)?,
            lead: alloc_zeroed(half)?,
            mdst: alloc_zeroed(block_size)?,
            power: alloc_zeroed(block_size)?,
            amp2: alloc_zeroed(block_size)?,
            masking: alloc_zeroed(block_size)?,
            keys: alloc_zeroed(total)?,
            order: alloc_zeroed(total)?,
        })
    }

    pub fn reset(&mut self) {
        self.lap.fill(0.0);
        self.carry.fill(0.0);
        self.lap_overlap = self.block_size;
        self.psycho.reset();
    }

    pub fn window(&self) -> &ModulationWindow {
        &self.window
    }

    /// Transform `history` (planar, already M/S mixed) with window code
    /// `ctrl`, ending on the leading overlap of `pending`.
    ///
    /// Fills `out` and returns the number of codeable coefficients.
    pub fn transform(
        &mut self,
        history: &[f32],
        ctrl: WindowCtrl,
        pending: WindowCtrl,
        use_psychoacoustics: bool,
        out: &mut BlockAnalysis,
    ) -> usize {
        let n = self.block_size;
        let half = n / 2;
        let pattern = ctrl.pattern(n);
        let following = pending.pattern(n).leading_overlap();

        self.amp2.fill(0.0);
        let mut complexity = 0.0f32;
        let mut complexity_w = 0.0f32;
        let mut last_overlap = self.lap_overlap;

        for ch in 0..self.channels {
            let samples = &history[ch * n..(ch + 1) * n];
            let lap = &mut self.lap[ch * half..(ch + 1) * half];
            let carry = &mut self.carry[ch * half..(ch + 1) * half];
            self.segment[..half].copy_from_slice(lap);
            self.segment[half..].copy_from_slice(samples);

            let base = ch * n;
            let mut left = self.lap_overlap;
            let mut offset = 0;
            for (j, sb) in pattern.iter().enumerate() {
                let size = sb.size;
                let right = pattern.right_overlap(j, following);
                let left_win = self.window.rising(left);
                let right_win = self.window.rising(right);

                let lead: &[f32] = if j == 0 {
                    &carry[..left / 2]
                } else {
                    let src = &self.segment[offset - left / 2..offset];
                    for ((dst, &x), &w) in self.lead.iter_mut().zip(src).zip(left_win) {
                        *dst = w * x;
                    }
                    &self.lead[..left / 2]
                };

                let coefs = &mut out.coefs[base + offset..base + offset + size];
                self.transform.forward(
                    &self.segment[offset..offset + size + right / 2],
                    lead,
                    left_win,
                    right_win,
                    coefs,
                    &mut self.mdst[..size],
                );

                // normalize, and treat MDCT as Re and MDST as Im
                let norm = 2.0 / size as f32;
                for k in 0..size {
                    let re = coefs[k] * norm;
                    let im = self.mdst[k] * norm;
                    coefs[k] = re;
                    let abs2 = re * re + im * im;
                    self.power[k] = abs2;
                    self.amp2[offset + k] += abs2;
                    complexity += abs2;
                    complexity_w += abs2.sqrt();
                }
                self.noise.log_spectrum(
                    &self.power[..size],
                    &mut out.noise[base + offset..base + offset + size],
                );

                left = right;
                offset += size;
            }

            // pre-window the next block's lead-in and keep the raw tail
            let fade = self.window.rising(left);
            let tail = &self.segment[n - left / 2..n];
            for ((dst, &x), &w) in carry.iter_mut().zip(tail).zip(fade) {
                *dst = w * x;
            }
            lap.copy_from_slice(&samples[half..]);
            last_overlap = left;
        }
        self.lap_overlap = last_overlap;

        out.complexity = finish_complexity(complexity, complexity_w, n);
        out.window_ctrl = ctrl;

        if use_psychoacoustics {
            self.psycho
                .masking_correction(&self.amp2, &pattern, &mut self.masking);
        } else {
            self.masking.fill(0.0);
        }

        out.usable = self.rank(&out.coefs, &mut out.ranks);
        trace!(
            "transformed block: ctrl {:#04x}, complexity {:.3}, {} usable coefficients",
            ctrl.code(),
            out.complexity,
            out.usable
        );
        out.usable
    }

    /// Importance keys and ranks; returns the count of usable coefficients
    fn rank(&mut self, coefs: &[f32], ranks: &mut [u32]) -> usize {
        let n = self.block_size;
        let mut usable = 0;
        for (i, (key, &c)) in self.keys.iter_mut().zip(coefs).enumerate() {
            let v = c.abs();
            *key = if v < 0.5 * COEF_EPS {
                f32::NEG_INFINITY
            } else {
                usable += 1;
                v.ln() + self.masking[i % n]
            };
        }

        for (i, o) in self.order.iter_mut().enumerate() {
            *o = i as u32;
        }
        let keys = &self.keys;
        self.order
            .sort_unstable_by(|&a, &b| keys[b as usize].total_cmp(&keys[a as usize]));
        for (rank, &idx) in self.order.iter().enumerate() {
            ranks[idx as usize] = rank as u32;
        }
        usable
    }
}

/// Normalized entropy of the amplitude distribution:
/// ln((Σ|X|)^2 / Σ|X|^2) / ln(N), clamped to [0, 1]
fn finish_complexity(sum_abs2: f32, sum_abs: f32, block_size: usize) -> f32 {
    if sum_abs2 <= 0.0 {
        return 0.0;
    }
    let scale = (block_size as f32).ln();
    let c = (sum_abs * sum_abs / sum_abs2).ln() / scale;
    if c.is_nan() {
        return 0.0;
    }
    c.clamp(0.0, 1.0)
}
