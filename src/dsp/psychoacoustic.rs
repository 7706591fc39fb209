use std::f32::consts::LN_10;

use crate::core::{DecimationPattern, MIN_OVERLAP};

/// Number of critical bands (Bark scale, 0-24 Bark for audio up to ~20kHz)
pub const NUM_BARK_BANDS: usize = 25;

/// Critical band edges in Hz (Bark scale)
pub const BARK_BAND_EDGES: [f32; 26] = [
    0.0, 100.0, 200.0, 300.0, 400.0, 510.0, 630.0, 770.0, 920.0, 1080.0, 1270.0, 1480.0, 1720.0,
    2000.0, 2320.0, 2700.0, 3150.0, 3700.0, 4400.0, 5300.0, 6400.0, 7700.0, 9500.0, 12000.0,
    15500.0, 20500.0,
];

/// dB below the masker at which noise becomes audible
const MASKING_OFFSET_DB: f32 = -6.0;

/// Post-masking decay per full block, 10*log10(0.7)
const POST_MASKING_DECAY_DB: f32 = -1.549;

/// Level of a full-scale coefficient on the ATH scale (dB SPL)
const FULL_SCALE_SPL_DB: f32 = 96.0;

/// How strongly masking steers the importance ranking
const MASKING_WEIGHT: f32 = 0.5;

/// Floor for empty bands
const SILENCE_DB: f32 = -100.0;

/// Per-size bin tables
#[derive(Debug, Clone)]
struct BinLayout {
    /// Bark band of each bin
    bark_band: Vec<usize>,
    /// Absolute threshold of hearing per bin, on the coefficient dB scale
    ath_db: Vec<f32>,
}

/// Psychoacoustic masking estimator
///
/// Turns the per-bin power of a block (summed over channels) into a
/// log-domain correction that is added to `ln|coef|` when ranking
/// coefficients. Masked bins get a negative correction, bins under a quiet
/// threshold a positive one.
#[derive(Debug, Clone)]
pub struct PsychoacousticModel {
    /// Sample rate
    sample_rate: u32,
    /// Block size
    block_size: usize,
    /// Bin layouts for subblock sizes 16..=block size, indexed by log2 - 4
    layouts: Vec<BinLayout>,
    /// Spreading function between Bark bands, in dB
    spreading_db: Vec<[f32; NUM_BARK_BANDS]>,
    /// Previous subblock's threshold per band (for temporal masking)
    prev_threshold: [f32; NUM_BARK_BANDS],
}

impl PsychoacousticModel {
    /// Create a new psychoacoustic model
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        let mut layouts = Vec::new();
        let mut size = MIN_OVERLAP;
        while size <= block_size {
            // MDCT bin k of an N-point subblock is centred on (k+0.5)*fs/2N
            let resolution = sample_rate as f32 / (2 * size) as f32;
            let freqs = (0..size).map(|k| (k as f32 + 0.5) * resolution);
            layouts.push(BinLayout {
                bark_band: freqs.clone().map(Self::freq_to_bark_band).collect(),
                ath_db: freqs
                    .map(|f| Self::absolute_threshold_of_hearing(f) - FULL_SCALE_SPL_DB)
                    .collect(),
            });
            size *= 2;
        }

        Self {
            sample_rate,
            block_size,
            layouts,
            spreading_db: Self::compute_spreading_function(),
            prev_threshold: [SILENCE_DB; NUM_BARK_BANDS],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Absolute Threshold of Hearing (ATH) in dB SPL
    /// Based on ISO 226 / Terhardt formula
    pub fn absolute_threshold_of_hearing(freq: f32) -> f32 {
        if !(20.0..=20000.0).contains(&freq) {
            return 96.0; // Essentially inaudible
        }

        let f_khz = freq / 1000.0;

        // ATH(f) = 3.64 * (f/1000)^-0.8 - 6.5 * exp(-0.6 * (f/1000 - 3.3)^2) + 10^-3 * (f/1000)^4
        let term1 = 3.64 * f_khz.powf(-0.8);
        let term2 = 6.5 * (-0.6 * (f_khz - 3.3).powi(2)).exp();
        let term3 = 0.001 * f_khz.powi(4);

        (term1 - term2 + term3).clamp(-10.0, 96.0)
    }

    /// Convert frequency to Bark scale
    pub fn freq_to_bark(freq: f32) -> f32 {
        // Traunmüller's formula
        let bark = ((26.81 * freq) / (1960.0 + freq)) - 0.53;
        bark.clamp(0.0, 24.0)
    }

    /// Get the Bark band index for a frequency
    pub fn freq_to_bark_band(freq: f32) -> usize {
        for (i, &edge) in BARK_BAND_EDGES.iter().enumerate().skip(1) {
            if freq < edge {
                return i - 1;
            }
        }
        NUM_BARK_BANDS - 1
    }

    /// Spreading between Bark bands in dB (masker `i` onto band `j`)
    fn compute_spreading_function() -> Vec<[f32; NUM_BARK_BANDS]> {
        (0..NUM_BARK_BANDS)
            .map(|i| {
                let mut row = [0.0f32; NUM_BARK_BANDS];
                for (j, spread) in row.iter_mut().enumerate() {
                    let delta_bark = j as f32 - i as f32;
                    *spread = if delta_bark >= 0.0 {
                        // Upper slope (masking above the masker)
                        -25.0 * delta_bark
                    } else {
                        // Lower slope (masking below the masker)
                        10.0 * delta_bark
                    };
                }
                row
            })
            .collect()
    }

    /// Masking threshold (dB) per Bark band for one subblock's power
    fn band_thresholds(
        spreading_db: &[[f32; NUM_BARK_BANDS]],
        prev_threshold: &mut [f32; NUM_BARK_BANDS],
        decay_db: f32,
        power: &[f32],
        bark_band: &[usize],
    ) -> [f32; NUM_BARK_BANDS] {
        // average energy per band
        let mut band_energy = [0.0f32; NUM_BARK_BANDS];
        let mut band_count = [0usize; NUM_BARK_BANDS];
        for (&p, &band) in power.iter().zip(bark_band) {
            band_energy[band] += p;
            band_count[band] += 1;
        }
        let mut band_db = [SILENCE_DB; NUM_BARK_BANDS];
        for b in 0..NUM_BARK_BANDS {
            let e = band_energy[b];
            if band_count[b] > 0 && e > 1e-10 {
                band_db[b] = 10.0 * (e / band_count[b] as f32).log10();
            }
        }

        // simultaneous masking
        let mut threshold = [SILENCE_DB; NUM_BARK_BANDS];
        for (j, &masker) in band_db.iter().enumerate() {
            if masker <= SILENCE_DB {
                continue;
            }
            for (i, t) in threshold.iter_mut().enumerate() {
                *t = t.max(masker + spreading_db[j][i]);
            }
        }

        // post-masking from the previous subblock
        for (t, prev) in threshold.iter_mut().zip(prev_threshold.iter_mut()) {
            *t = (*t + MASKING_OFFSET_DB).max(*prev + decay_db).max(SILENCE_DB);
            *prev = *t;
        }

        threshold
    }

    /// Masking correction (nepers) for every coefficient position of a block
    ///
    /// `power` and `correction` are laid out like one channel of the block:
    /// subblocks back to back in pattern order.
    pub fn masking_correction(
        &mut self,
        power: &[f32],
        pattern: &DecimationPattern,
        correction: &mut [f32],
    ) {
        let db_to_np = -MASKING_WEIGHT * LN_10 / 20.0;
        let mut offset = 0;
        for sb in pattern {
            let size = sb.size;
            let out = &mut correction[offset..offset + size];
            let layout = size
                .trailing_zeros()
                .checked_sub(MIN_OVERLAP.trailing_zeros())
                .and_then(|idx| self.layouts.get(idx as usize));
            let Some(layout) = layout else {
                out.fill(0.0);
                offset += size;
                continue;
            };

            // post-masking decays with elapsed time
            let decay_db = POST_MASKING_DECAY_DB * size as f32 / self.block_size as f32;
            let threshold = Self::band_thresholds(
                &self.spreading_db,
                &mut self.prev_threshold,
                decay_db,
                &power[offset..offset + size],
                &layout.bark_band,
            );
            for (k, c) in out.iter_mut().enumerate() {
                let t = threshold[layout.bark_band[k]].max(layout.ath_db[k]);
                *c = t * db_to_np;
            }
            offset += size;
        }
    }

    /// Reset temporal state (for seeking/discontinuities)
    pub fn reset(&mut self) {
        self.prev_threshold.fill(SILENCE_DB);
    }
}
