//! Nybble-oriented bitstream grammar
//!
//! Every token is a short run of 4-bit values. The escape nybble `8`
//! followed by `0` ("lead") introduces quantizer changes and block
//! terminators once a quantizer has been set, `8,n` is a short zero run,
//! and a leading `0` nybble starts a long zero run or a noise-fill run.
//! Plain nybbles `1..7` / `9..F` are companded coefficients.

use super::types::{WindowCtrl, QUANTIZER_BIAS};

/// Shortest short zero run
pub const SHORT_RUN_MIN: usize = 1;
/// Longest short zero run
pub const SHORT_RUN_MAX: usize = 0xF;
/// Shortest long zero run (two short runs cover anything below this)
pub const LONG_RUN_MIN: usize = 31;
/// Longest long zero run
pub const LONG_RUN_MAX: usize = LONG_RUN_MIN + 0x1FF;
/// Shortest noise-fill run
pub const NOISE_RUN_MIN: usize = 16;
/// Longest noise-fill run
pub const NOISE_RUN_MAX: usize = NOISE_RUN_MIN + 0x1FF;

/// One syntactic element of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Window control code; one nybble, two when decimated
    WindowHeader(WindowCtrl),
    /// Quantizer index (biased by 5); `lead` is set for every change after the first
    QuantizerChange { index: u8, lead: bool },
    /// 1..=15 zeros
    ZeroRunShort(u8),
    /// 31..=542 zeros
    ZeroRunLong(u16),
    /// 16..=527 coefficients synthesized as noise at `level` (1..=7)
    NoiseFillRun { len: u16, level: u8 },
    /// Rest of the subblock synthesized as exponentially decaying noise
    NoiseFillToEnd { level: u8, decay: u8 },
    /// Companded coefficient nybble
    Coefficient(u8),
    /// End of subblock; `lead` is set if any quantizer was written
    Stop { lead: bool },
}

/// Fixed-capacity nybble sequence of a single token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nybbles {
    buf: [u8; 6],
    len: usize,
}

impl Nybbles {
    fn new() -> Self {
        Self {
            buf: [0; 6],
            len: 0,
        }
    }

    fn push(&mut self, x: u8) {
        self.buf[self.len] = x & 0xF;
        self.len += 1;
    }

    fn lead(&mut self) {
        self.push(0x8);
        self.push(0x0);
    }
}

impl std::ops::Deref for Nybbles {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Token {
    /// Encode table
    pub fn nybbles(&self) -> Nybbles {
        let mut out = Nybbles::new();
        match *self {
            Token::WindowHeader(ctrl) => {
                let code = ctrl.code();
                out.push(code);
                if ctrl.is_decimated() {
                    out.push(code >> 4);
                }
            }
            Token::QuantizerChange { index, lead } => {
                if lead {
                    out.lead();
                }
                let s = index.saturating_sub(QUANTIZER_BIAS);
                if s < 0xE {
                    out.push(s);
                } else {
                    out.push(0xE);
                    out.push(s - 0xE);
                }
            }
            Token::ZeroRunShort(n) => {
                out.push(0x8);
                out.push(n);
            }
            Token::ZeroRunLong(n) => {
                let v = (n as usize).saturating_sub(LONG_RUN_MIN);
                out.push(0x0);
                out.push((v >> 5) as u8);
                out.push((v >> 1) as u8);
                out.push((v & 1) as u8);
            }
            Token::NoiseFillRun { len, level } => {
                let v = (len as usize).saturating_sub(NOISE_RUN_MIN);
                out.push(0x0);
                out.push((v >> 5) as u8);
                out.push((v >> 1) as u8);
                out.push((v & 1) as u8 | level << 1);
            }
            Token::NoiseFillToEnd { level, decay } => {
                out.lead();
                out.push(0xF);
                let q = level.saturating_sub(1) << 1;
                if decay > 0xF {
                    out.push(q | 1);
                    out.push(decay >> 4);
                    out.push(decay);
                } else {
                    out.push(q);
                    out.push(decay);
                }
            }
            Token::Coefficient(x) => out.push(x),
            Token::Stop { lead } => {
                if lead {
                    out.lead();
                }
                out.push(0xE);
                out.push(0xF);
            }
        }
        out
    }

    /// Size of this token in bits
    pub fn size_bits(&self) -> usize {
        self.nybbles().len() * 4
    }
}

/// Nybble writer, first nybble in the high half of each byte
#[derive(Debug, Default)]
pub struct NybbleWriter {
    bytes: Vec<u8>,
    size_bits: usize,
}

impl NybbleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer backed by a pre-reserved buffer
    pub fn with_buffer(mut bytes: Vec<u8>) -> Self {
        bytes.clear();
        Self {
            bytes,
            size_bits: 0,
        }
    }

    /// Start a new stream, keeping the allocation
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.size_bits = 0;
    }

    pub fn write_nybble(&mut self, x: u8) {
        let x = x & 0xF;
        if self.size_bits % 8 == 0 {
            self.bytes.push(x << 4);
        } else if let Some(last) = self.bytes.last_mut() {
            *last |= x;
        }
        self.size_bits += 4;
    }

    pub fn write_token(&mut self, token: Token) {
        for &x in token.nybbles().iter() {
            self.write_nybble(x);
        }
    }

    /// Bits written so far (not byte aligned)
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }

    /// Size rounded up to whole bytes, in bits
    pub fn padded_size_bits(&self) -> usize {
        (self.size_bits + 7) & !7
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Nybble reader matching [`NybbleWriter`]
pub struct NybbleReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> NybbleReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        NybbleReader { bytes, pos: 0 }
    }

    /// Next nybble, or `None` at the end of the data
    pub fn read_nybble(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos / 2)?;
        let x = if self.pos % 2 == 0 { byte >> 4 } else { byte & 0xF };
        self.pos += 1;
        Some(x)
    }

    /// Nybbles consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.bytes.len() * 2
    }
}

impl Iterator for NybbleReader<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.read_nybble()
    }
}
