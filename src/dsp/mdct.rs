//! Lapped MDCT/MDST on top of an FFT-based DCT-IV
//!
//! The DCT-IV kernel is the usual half-length complex FFT with a pre- and
//! post-twiddle.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::core::MIN_OVERLAP;

/// FFT-based DCT-IV for one size
///
/// X[k] = Σ x[n] * cos(π/N * (n + 0.5) * (k + 0.5))
pub struct DctIv {
    /// Transform size (N)
    n: usize,
    /// Forward FFT of size N/2
    fft: Arc<dyn Fft<f32>>,
    /// e^(-iπ(k + 1/4)/N)
    pre_twiddle: Vec<Complex<f32>>,
    /// e^(-iπk/N)
    post_twiddle: Vec<Complex<f32>>,
}

impl DctIv {
    pub fn new(n: usize, planner: &mut FftPlanner<f32>) -> Self {
        let n2 = n / 2;
        let fft = planner.plan_fft_forward(n2);

        let pre_twiddle = (0..n2)
            .map(|k| {
                let theta = -PI * (k as f32 + 0.25) / n as f32;
                Complex::new(theta.cos(), theta.sin())
            })
            .collect();
        let post_twiddle = (0..n2)
            .map(|k| {
                let theta = -PI * k as f32 / n as f32;
                Complex::new(theta.cos(), theta.sin())
            })
            .collect();

        Self {
            n,
            fft,
            pre_twiddle,
            post_twiddle,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Scratch length `process` needs for the FFT
    pub fn scratch_len(&self) -> usize {
        self.fft.get_inplace_scratch_len()
    }

    /// In-place DCT-IV of `data` (length N)
    ///
    /// `buf` must hold N/2 values and `scratch` at least `scratch_len()`.
    pub fn process(
        &self,
        data: &mut [f32],
        buf: &mut [Complex<f32>],
        scratch: &mut [Complex<f32>],
    ) {
        let n = self.n;
        let n2 = n / 2;
        let buf = &mut buf[..n2];

        // even samples as Re, reversed odd samples as Im
        for (k, z) in buf.iter_mut().enumerate() {
            *z = Complex::new(data[2 * k], data[n - 1 - 2 * k]) * self.pre_twiddle[k];
        }

        self.fft
            .process_with_scratch(buf, &mut scratch[..self.fft.get_inplace_scratch_len()]);

        for (k, z) in buf.iter().enumerate() {
            let y = *z * self.post_twiddle[k];
            data[2 * k] = y.re;
            data[n - 1 - 2 * k] = -y.im;
        }
    }
}

/// Lapped MDCT + MDST with per-subblock overlap sizes
///
/// For a subblock of `N` coefficients the analysis frame is `2N` samples
/// centred on the subblock. The left overlap `Ol` and right overlap `Or`
/// (both ≤ N) shape the window: zero outside the overlaps, one between them,
/// rising/falling modulation-window halves inside them.
///
/// Input split:
/// - `samples`: the N core samples followed by the `Or/2` samples past it
/// - `lead_in`: the `Ol/2` samples before the core, already multiplied by
///   the first half of the rising left window
///
/// Outputs are unnormalized:
/// - MDCT: X[k] = Σ w[n] x[n] cos(π/N (n + 0.5 + N/2)(k + 0.5))
/// - MDST: Y[k] = Σ w[n] x[n] sin(π/N (n + 0.5 + N/2)(k + 0.5))
pub struct LappedTransform {
    /// One kernel per power-of-two size, indexed by log2(N) - 4
    kernels: Vec<DctIv>,
    /// Folded cosine input
    fold_cos: Vec<f32>,
    /// Folded sine input
    fold_sin: Vec<f32>,
    /// Complex FFT buffer
    buf: Vec<Complex<f32>>,
    /// FFT scratch
    scratch: Vec<Complex<f32>>,
}

impl LappedTransform {
    /// Plan kernels for every size 16..=max_size
    pub fn new(max_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let mut kernels = Vec::new();
        let mut n = MIN_OVERLAP;
        while n <= max_size {
            kernels.push(DctIv::new(n, &mut planner));
            n *= 2;
        }

        let scratch_len = kernels.iter().map(DctIv::scratch_len).max().unwrap_or(0);
        Self {
            kernels,
            fold_cos: vec![0.0; max_size],
            fold_sin: vec![0.0; max_size],
            buf: vec![Complex::new(0.0, 0.0); max_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Largest supported subblock
    pub fn max_size(&self) -> usize {
        self.fold_cos.len()
    }

    /// Run a plain DCT-IV of `data.len()` points in place
    pub fn dct_iv(&mut self, data: &mut [f32]) {
        let n = data.len();
        let Some(kernel) = find_kernel(&self.kernels, n) else {
            return;
        };
        kernel.process(data, &mut self.buf, &mut self.scratch);
    }

    /// Forward MDCT and MDST of one subblock
    ///
    /// `left`/`right` are the rising window halves of length Ol/Or. The
    /// subblock size is `mdct.len()`, which must be a planned size.
    pub fn forward(
        &mut self,
        samples: &[f32],
        lead_in: &[f32],
        left: &[f32],
        right: &[f32],
        mdct: &mut [f32],
        mdst: &mut [f32],
    ) {
        let n = mdct.len();
        let n2 = n / 2;
        let ol = left.len();
        let or = right.len();
        let ol2 = ol / 2;
        let or2 = or / 2;

        let u = &mut self.fold_cos[..n];
        let v = &mut self.fold_sin[..n];

        // left half: the rising edge folds onto itself
        for k in 0..n2 {
            let xq = samples[n2 - 1 - k];
            if k + ol2 < n2 {
                u[n2 + k] = -xq;
                v[n2 + k] = xq;
            } else {
                let i = k + ol2 - n2;
                let wl = lead_in[i];
                let wr = left[ol - 1 - i] * xq;
                u[n2 + k] = wl - wr;
                v[n2 + k] = wl + wr;
            }
        }

        // right half: the falling edge folds onto itself
        for k in 0..n2 {
            let xc = samples[n - 1 - k];
            if k >= or2 {
                u[k] = -xc;
                v[k] = xc;
            } else {
                let xd = samples[n + k];
                let wc = right[or2 + k];
                let wd = right[or2 - 1 - k];
                u[k] = -wc * xc - wd * xd;
                v[k] = wc * xc - wd * xd;
            }
        }

        let Some(kernel) = find_kernel(&self.kernels, n) else {
            return;
        };

        kernel.process(u, &mut self.buf, &mut self.scratch);
        mdct.copy_from_slice(u);

        // MDST[k] = (-1)^k * DCT-IV(reversed sine fold)[k]
        v.reverse();
        kernel.process(v, &mut self.buf, &mut self.scratch);
        for (k, (dst, &src)) in mdst.iter_mut().zip(v.iter()).enumerate() {
            *dst = if k % 2 == 0 { src } else { -src };
        }
    }
}

fn find_kernel(kernels: &[DctIv], n: usize) -> Option<&DctIv> {
    let idx = n.trailing_zeros().checked_sub(MIN_OVERLAP.trailing_zeros())?;
    kernels.get(idx as usize).filter(|k| k.len() == n)
}
