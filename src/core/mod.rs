pub mod bitstream;
pub mod config;
pub mod error;
pub mod types;

pub use bitstream::{NybbleReader, NybbleWriter, Token};
pub use config::EncoderConfig;
pub use error::{UlcError, UlcResult};
pub use types::*;
