//! Noise-level estimation for noise-fill coding
//!
//! The log spectrum holds, per coefficient, the smoothed log amplitude
//! (nepers) of its neighbourhood. Noise-fill levels are expressed on the
//! same companded scale as coefficients: `round(sqrt(amplitude * q))`.

/// Power floor before taking logs
const POWER_FLOOR: f32 = 1.0e-30;

/// Half-width of the smoothing window, in bins
const SMOOTHING_RADIUS: usize = 8;

/// Largest level of a noise-fill run
pub const MAX_RUN_LEVEL: u8 = 7;

/// Largest level of a noise-fill tail
pub const MAX_TAIL_LEVEL: u8 = 8;

/// Fixed-point scale of the tail decay (nepers per coefficient)
pub const DECAY_SCALE: f32 = 4096.0;

/// Noise spectrum estimator
#[derive(Debug, Default, Clone)]
pub struct NoiseEstimator {
    /// Running sums of the log power
    prefix: Vec<f64>,
}

impl NoiseEstimator {
    pub fn new(max_size: usize) -> Self {
        Self {
            prefix: Vec::with_capacity(max_size + 1),
        }
    }

    /// Smoothed log amplitude of one subblock's power spectrum
    pub fn log_spectrum(&mut self, power: &[f32], out: &mut [f32]) {
        let n = power.len();
        self.prefix.clear();
        self.prefix.push(0.0);
        let mut acc = 0.0f64;
        for &p in power {
            acc += f64::from(p.max(POWER_FLOOR).ln());
            self.prefix.push(acc);
        }

        for (k, o) in out[..n].iter_mut().enumerate() {
            let lo = k.saturating_sub(SMOOTHING_RADIUS);
            let hi = (k + SMOOTHING_RADIUS + 1).min(n);
            let mean = (self.prefix[hi] - self.prefix[lo]) / (hi - lo) as f64;
            *o = (0.5 * mean) as f32;
        }
    }
}

/// Quantized level of a noise-fill run over `log_spectrum`, 0 if unusable
pub fn run_level(log_spectrum: &[f32], q: f32) -> u8 {
    if log_spectrum.is_empty() {
        return 0;
    }
    let mean = log_spectrum.iter().sum::<f32>() / log_spectrum.len() as f32;
    companded_level(mean, q, MAX_RUN_LEVEL)
}

/// Level and decay of an exponentially decaying noise tail, `None` if unusable
///
/// Fits a line to the log spectrum; the intercept gives the starting level
/// and the slope the decay rate.
pub fn tail_params(log_spectrum: &[f32], q: f32) -> Option<(u8, u8)> {
    let n = log_spectrum.len();
    if n < 2 {
        return None;
    }

    let mean_x = (n - 1) as f32 / 2.0;
    let mean_y = log_spectrum.iter().sum::<f32>() / n as f32;
    let mut cov = 0.0f32;
    let mut var = 0.0f32;
    for (x, &y) in log_spectrum.iter().enumerate() {
        let dx = x as f32 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    let slope = cov / var;
    let intercept = mean_y - slope * mean_x;

    let level = companded_level(intercept, q, MAX_TAIL_LEVEL);
    if level == 0 {
        return None;
    }
    let decay = (-slope * DECAY_SCALE).round().clamp(0.0, 255.0) as u8;
    Some((level, decay))
}

fn companded_level(log_amplitude: f32, q: f32, max: u8) -> u8 {
    let level = (log_amplitude.exp() * q).sqrt().round();
    if level.is_nan() {
        return 0;
    }
    level.clamp(0.0, max as f32) as u8
}
