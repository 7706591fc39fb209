//! Block encoder session
//!
//! Per block: the new samples are analysed for the *next* block's window
//! code, the block held in the history is transformed with the code decided
//! on the previous call, and rate control picks how many coefficients (in
//! importance order) to code.

pub mod encode;
pub mod rate;
pub mod transform;
pub mod window_control;

#[cfg(test)]
mod tests;

use log::{debug, trace};

use crate::core::{EncoderConfig, NybbleWriter, UlcError, UlcResult, WindowCtrl};
use crate::dsp::ModulationWindow;

pub use rate::{bit_budget, ComplexityAverager};
pub use transform::{mid_side, BlockAnalysis, BlockTransformer};
pub use window_control::TransientDetector;

/// Reserve exactly `len` default values, reporting allocation failure
pub(crate) fn alloc_zeroed<T: Clone + Default>(len: usize) -> UlcResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Encoded block borrowed from the session's output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedBlock<'a> {
    bytes: &'a [u8],
    size_bits: usize,
}

impl<'a> EncodedBlock<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Size in bits; always a whole number of bytes
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

/// Encoder state for one stream
///
/// Not shareable between threads while encoding; independent streams use
/// independent states.
pub struct EncoderState {
    config: EncoderConfig,
    /// Planar previous input block; becomes the block being transformed
    history: Vec<f32>,
    /// Window code of the block transformed last
    window_ctrl: WindowCtrl,
    /// Window code decided from the newest input, applied next call
    pending_window_ctrl: WindowCtrl,
    detector: TransientDetector,
    transformer: BlockTransformer,
    analysis: BlockAnalysis,
    output: NybbleWriter,
}

impl EncoderState {
    /// Validate the config and allocate every session buffer
    pub fn new(config: EncoderConfig) -> UlcResult<Self> {
        config.validate()?;
        let window = ModulationWindow::new(config.window_shape, config.block_size);
        Self::build(config, window)
    }

    /// Like [`EncoderState::new`] with a caller-supplied modulation window
    pub fn with_window(config: EncoderConfig, window: Vec<f32>) -> UlcResult<Self> {
        config.validate()?;
        let window = ModulationWindow::custom(config.block_size, window)?;
        Self::build(config, window)
    }

    fn build(config: EncoderConfig, window: ModulationWindow) -> UlcResult<Self> {
        let n = config.block_size;
        let total = config.coefficients_per_block();

        let mut output = Vec::new();
        output.try_reserve_exact(total)?;

        let state = Self {
            history: alloc_zeroed(total)?,
            window_ctrl: WindowCtrl::INITIAL,
            pending_window_ctrl: WindowCtrl::INITIAL,
            detector: TransientDetector::new(n)?,
            transformer: BlockTransformer::new(config.sample_rate, config.channels, n, window)?,
            analysis: BlockAnalysis::new(total)?,
            output: NybbleWriter::with_buffer(output),
            config,
        };
        debug!(
            "encoder ready: {} Hz, {} channels, block size {}, psychoacoustics {}, noise fill {}, window switching {}",
            state.config.sample_rate,
            state.config.channels,
            state.config.block_size,
            state.config.use_psychoacoustics,
            state.config.use_noise_fill,
            state.config.use_window_switching
        );
        Ok(state)
    }

    /// Replace the session with a fresh one for `config`
    ///
    /// Validation and allocation happen first; on error `self` is untouched.
    pub fn reconfigure(&mut self, config: EncoderConfig) -> UlcResult<()> {
        *self = Self::new(config)?;
        Ok(())
    }

    /// Forget all history, as if freshly initialised
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.window_ctrl = WindowCtrl::INITIAL;
        self.pending_window_ctrl = WindowCtrl::INITIAL;
        self.detector.reset();
        self.transformer.reset();
        self.analysis.clear();
        self.output.clear();
        debug!("encoder reset");
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Complexity of the last transformed block, in [0, 1]
    pub fn block_complexity(&self) -> f32 {
        self.analysis.complexity
    }

    /// Window code applied to the last transformed block
    pub fn window_ctrl(&self) -> WindowCtrl {
        self.window_ctrl
    }

    /// Window code that will be applied to the next block
    pub fn pending_window_ctrl(&self) -> WindowCtrl {
        self.pending_window_ctrl
    }

    /// Normalized MDCT coefficients of the last transformed block
    pub fn coefficients(&self) -> &[f32] {
        &self.analysis.coefs
    }

    /// Importance rank of every coefficient (0 = most important)
    pub fn ranks(&self) -> &[u32] {
        &self.analysis.ranks
    }

    /// Number of coefficients above the codeable floor
    pub fn usable_coefficients(&self) -> usize {
        self.analysis.usable
    }

    pub fn modulation_window(&self) -> &ModulationWindow {
        self.transformer.window()
    }

    /// Window control and transform for one planar block; returns the
    /// number of codeable coefficients
    fn transform_block(&mut self, samples: &[f32]) -> UlcResult<usize> {
        let expected = self.config.coefficients_per_block();
        if samples.len() != expected {
            return Err(UlcError::InvalidInput {
                expected,
                got: samples.len(),
            });
        }
        let n = self.config.block_size;
        let channels = self.config.channels;

        let next = self.detector.analyze(
            samples,
            &self.history,
            channels,
            self.config.use_window_switching,
        );
        self.window_ctrl = self.pending_window_ctrl;
        self.pending_window_ctrl = next;

        if channels == 2 {
            mid_side(&mut self.history, n);
        }
        let usable = self.transformer.transform(
            &self.history,
            self.window_ctrl,
            self.pending_window_ctrl,
            self.config.use_psychoacoustics,
            &mut self.analysis,
        );
        self.history.copy_from_slice(samples);
        Ok(usable)
    }

    /// Transform a block without encoding it; returns its complexity
    ///
    /// Used for an analysis pass that feeds [`ComplexityAverager`] before an
    /// ABR encode.
    pub fn analyze_block(&mut self, samples: &[f32]) -> UlcResult<f32> {
        self.transform_block(samples)?;
        Ok(self.analysis.complexity)
    }

    fn pass(&mut self, cutoff: usize) -> usize {
        encode::encode_pass(
            &self.analysis,
            self.config.block_size,
            self.config.channels,
            self.config.use_noise_fill,
            cutoff,
            &mut self.output,
        )
    }

    fn output(&self, size_bits: usize) -> EncodedBlock<'_> {
        EncodedBlock {
            bytes: self.output.as_bytes(),
            size_bits,
        }
    }

    /// Re-encode the last transformed block, coding coefficients ranked
    /// below `cutoff`
    pub fn encode_pass(&mut self, cutoff: usize) -> EncodedBlock<'_> {
        let size = self.pass(cutoff);
        self.output(size)
    }

    /// CBR search over an already transformed block
    fn encode_cbr(&mut self, rate_kbps: f32, max_coef: usize) -> EncodedBlock<'_> {
        let budget = bit_budget(self.config.block_size, rate_kbps, self.config.sample_rate);
        let (cutoff, size) = rate::search_cutoff(max_coef, budget, |c| self.pass(c));
        trace!("cbr: {rate_kbps:.2} kbps, budget {budget} bits, cutoff {cutoff}, {size} bits");
        self.output(size)
    }

    /// Encode at a constant bit rate, never exceeding the block budget
    /// (except that headers and terminators are always written)
    pub fn encode_block_cbr(
        &mut self,
        samples: &[f32],
        rate_kbps: f32,
    ) -> UlcResult<EncodedBlock<'_>> {
        let max_coef = self.transform_block(samples)?;
        Ok(self.encode_cbr(rate_kbps, max_coef))
    }

    /// Encode towards an average bit rate, given the average complexity of
    /// the stream (e.g. from an [`analyze_block`](Self::analyze_block) pass)
    pub fn encode_block_abr(
        &mut self,
        samples: &[f32],
        rate_kbps: f32,
        avg_complexity: f32,
    ) -> UlcResult<EncodedBlock<'_>> {
        let max_coef = self.transform_block(samples)?;
        let target = rate::abr_target_kbps(
            rate_kbps,
            self.analysis.complexity,
            avg_complexity,
            self.config.abr_exponent,
        );
        Ok(self.encode_cbr(target, max_coef))
    }

    /// Encode for a quality in (0, 100) with a single pass
    pub fn encode_block_vbr(&mut self, samples: &[f32], quality: f32) -> UlcResult<EncodedBlock<'_>> {
        let max_coef = self.transform_block(samples)?;
        let cutoff = rate::vbr_cutoff(
            quality,
            self.config.vbr_curve,
            self.analysis.complexity,
            self.config.coefficients_per_block(),
            max_coef,
        );
        let size = self.pass(cutoff);
        trace!("vbr: quality {quality}, cutoff {cutoff}, {size} bits");
        Ok(self.output(size))
    }
}
