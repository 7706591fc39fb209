//! Signal-processing collaborators of the encoder
//!
//! Lapped MDCT/MDST, modulation windows, psychoacoustic masking, noise
//! estimation and quantization.

pub mod mdct;
pub mod noise;
pub mod psychoacoustic;
pub mod quantizer;
pub mod window;

// Re-export main types
pub use mdct::{DctIv, LappedTransform};
pub use noise::NoiseEstimator;
pub use psychoacoustic::{PsychoacousticModel, BARK_BAND_EDGES, NUM_BARK_BANDS};
pub use window::{ModulationWindow, WindowShape};
