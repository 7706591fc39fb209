//! Bitstream encoding of a transformed block for a given coefficient cutoff

use crate::core::bitstream::{
    LONG_RUN_MAX, LONG_RUN_MIN, NOISE_RUN_MAX, NOISE_RUN_MIN, SHORT_RUN_MAX,
};
use crate::core::{NybbleWriter, Token};
use crate::dsp::{noise, quantizer};

use super::transform::BlockAnalysis;

/// A quantizer zone is closed once a coefficient drops this far below the
/// zone's mean magnitude...
const ZONE_RANGE_LO: f32 = 8.0;
/// ...or rises this far above it
const ZONE_RANGE_HI: f32 = 2.0;

/// Tails of at most this many coefficients are cheaper as a zero run
const SHORT_TAIL: usize = 4;

/// Encode one block, coding only coefficients ranked below `cutoff`
///
/// The cutoff never reaches past the usable coefficients. Clears `out`,
/// writes the stream and returns its size in bits, rounded up to whole
/// bytes.
pub(crate) fn encode_pass(
    analysis: &BlockAnalysis,
    block_size: usize,
    channels: usize,
    use_noise_fill: bool,
    cutoff: usize,
    out: &mut NybbleWriter,
) -> usize {
    out.clear();
    let ctrl = analysis.window_ctrl;
    out.write_token(Token::WindowHeader(ctrl));

    let pass = Pass {
        coefs: &analysis.coefs,
        noise: &analysis.noise,
        ranks: &analysis.ranks,
        cutoff: cutoff.min(analysis.usable),
        noise_fill: use_noise_fill,
    };
    let pattern = ctrl.pattern(block_size);
    let mut idx = 0;
    for _ in 0..channels {
        for sb in &pattern {
            pass.write_subblock(idx, sb.size, out);
            idx += sb.size;
        }
    }

    out.padded_size_bits()
}

struct Pass<'a> {
    coefs: &'a [f32],
    noise: &'a [f32],
    ranks: &'a [u32],
    cutoff: usize,
    noise_fill: bool,
}

impl Pass<'_> {
    fn eligible(&self, idx: usize) -> bool {
        (self.ranks[idx] as usize) < self.cutoff
    }

    fn skip_ineligible(&self, mut idx: usize, end: usize) -> usize {
        while idx < end && !self.eligible(idx) {
            idx += 1;
        }
        idx
    }

    fn write_subblock(&self, start: usize, size: usize, out: &mut NybbleWriter) {
        let end = start + size;
        let mut next_coded = start;
        let mut quant: Option<u8> = None;
        let mut zone_start: Option<usize> = None;
        let mut sum = 0.0f32;
        let mut weight = 0.0f32;

        let mut idx = start;
        loop {
            idx = self.skip_ineligible(idx, end);

            // a magnitude of zero past the end flushes the last zone
            let band = if idx < end {
                zone_start.get_or_insert(idx);
                self.coefs[idx].abs()
            } else {
                0.0
            };

            // contraharmonic mean sum/weight out of range?
            if ZONE_RANGE_LO * band * weight < sum || band * weight > ZONE_RANGE_HI * sum {
                if let Some(zs) = zone_start {
                    next_coded =
                        self.write_zone(zs, idx, sum / weight, next_coded, &mut quant, out);
                }
                zone_start = Some(idx);
                sum = 0.0;
                weight = 0.0;
            }
            sum += band * band;
            weight += band;

            if idx >= end {
                break;
            }
            idx += 1;
        }

        let remaining = end - next_coded;
        if remaining > SHORT_TAIL {
            let tail = quant
                .filter(|_| self.noise_fill && remaining >= NOISE_RUN_MIN)
                .and_then(|qi| {
                    noise::tail_params(&self.noise[next_coded..end], quantizer::step(qi))
                });
            match tail {
                Some((level, decay)) => out.write_token(Token::NoiseFillToEnd { level, decay }),
                None => out.write_token(Token::Stop {
                    lead: quant.is_some(),
                }),
            }
        } else if remaining > 0 {
            out.write_token(Token::ZeroRunShort(remaining as u8));
        }
    }

    /// Code the eligible coefficients of `[start, end)` with one quantizer;
    /// returns the index after the last coded coefficient
    fn write_zone(
        &self,
        start: usize,
        end: usize,
        scale: f32,
        mut next_coded: usize,
        quant: &mut Option<u8>,
        out: &mut NybbleWriter,
    ) -> usize {
        let qi = quantizer::quantizer_index(scale);
        let q = quantizer::step(qi);
        if *quant != Some(qi) {
            out.write_token(Token::QuantizerChange {
                index: qi,
                lead: quant.is_some(),
            });
            *quant = Some(qi);
        }

        let mut idx = start;
        while idx < end {
            next_coded = self.write_gap(next_coded, idx, q, out);
            out.write_token(Token::Coefficient(quantizer::quantize(self.coefs[idx], q)));
            next_coded += 1;
            idx = self.skip_ineligible(idx + 1, end);
        }
        next_coded
    }

    /// Zero or noise runs covering `[from, to)`
    fn write_gap(&self, mut from: usize, to: usize, q: f32, out: &mut NybbleWriter) -> usize {
        while from < to {
            let gap = to - from;

            if self.noise_fill && gap >= NOISE_RUN_MIN {
                let len = gap.min(NOISE_RUN_MAX);
                let level = noise::run_level(&self.noise[from..from + len], q);
                if level > 0 {
                    out.write_token(Token::NoiseFillRun {
                        len: len as u16,
                        level,
                    });
                    from += len;
                    continue;
                }
            }

            // two short runs are as cheap as one long run below 31 zeros
            if gap < LONG_RUN_MIN {
                let len = gap.min(SHORT_RUN_MAX);
                out.write_token(Token::ZeroRunShort(len as u8));
                from += len;
            } else {
                let len = gap.min(LONG_RUN_MAX);
                out.write_token(Token::ZeroRunLong(len as u16));
                from += len;
            }
        }
        from
    }
}
