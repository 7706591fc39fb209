//! Rate control: how many coefficients (by importance rank) get coded

/// Bit budget of one block at `rate_kbps`: floor(B * kbps * 1000 / rate)
pub fn bit_budget(block_size: usize, rate_kbps: f32, sample_rate: u32) -> usize {
    let bits = block_size as f64 * f64::from(rate_kbps) * 1000.0 / f64::from(sample_rate);
    if bits.is_nan() || bits <= 0.0 {
        0
    } else {
        bits.floor().min(usize::MAX as f64) as usize
    }
}

/// Largest cutoff in `0..=max_cutoff` whose pass fits `budget`
///
/// `pass(cutoff)` encodes with the given cutoff and returns the size in
/// bits; its size is non-decreasing in the cutoff. On return the last pass
/// run is the chosen one. If even cutoff 0 does not fit, cutoff 0 is used.
pub fn search_cutoff<F>(max_cutoff: usize, budget: usize, mut pass: F) -> (usize, usize)
where
    F: FnMut(usize) -> usize,
{
    // lo fits (or is 0), hi does not (or is past the end)
    let mut lo = 0;
    let mut hi = max_cutoff + 1;
    let mut last: Option<(usize, usize)> = None;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        let size = pass(mid);
        last = Some((mid, size));
        if size <= budget {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    match last {
        Some((cutoff, size)) if cutoff == lo => (lo, size),
        _ => (lo, pass(lo)),
    }
}

/// ABR target rate: nominal rate scaled by (complexity / average)^exponent
///
/// Falls back to the nominal rate when there is no usable average.
pub fn abr_target_kbps(rate_kbps: f32, complexity: f32, avg_complexity: f32, exponent: f32) -> f32 {
    if !(avg_complexity > 0.0) || !avg_complexity.is_finite() {
        return rate_kbps;
    }
    rate_kbps * (complexity / avg_complexity).powf(exponent)
}

/// VBR cutoff: `total * complexity / (curve * ln(100 / quality))`, capped
/// to `max_cutoff`; no reduction when the target complexity is not positive
pub fn vbr_cutoff(
    quality: f32,
    curve: f32,
    complexity: f32,
    total_coefficients: usize,
    max_cutoff: usize,
) -> usize {
    let target = curve * (100.0 / quality).ln();
    let cutoff = if target > 0.0 {
        let n = total_coefficients as f32 * complexity / target;
        if n.is_nan() {
            0
        } else {
            n.max(0.0) as usize
        }
    } else {
        total_coefficients
    };
    cutoff.min(max_cutoff)
}

/// Running mean of block complexity for an ABR analysis pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComplexityAverager {
    sum: f64,
    blocks: u64,
}

impl ComplexityAverager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, complexity: f32) {
        self.sum += f64::from(complexity);
        self.blocks += 1;
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Mean complexity, or 0 before any block was pushed
    pub fn average(&self) -> f32 {
        if self.blocks == 0 {
            0.0
        } else {
            (self.sum / self.blocks as f64) as f32
        }
    }
}
