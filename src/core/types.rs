//! common types for the ulc encoder

// constants

/// smallest channel count
pub const MIN_CHANNELS: usize = 1;
/// largest channel count
pub const MAX_CHANNELS: usize = 255;

/// smallest block size (a 64-point MDCT is already extreme)
pub const MIN_BLOCK_SIZE: usize = 64;
/// largest block size
pub const MAX_BLOCK_SIZE: usize = 8192;

/// smallest subblock the transient search may decimate down to
pub const MIN_SUBBLOCK_SIZE: usize = 64;

/// smallest transform overlap
pub const MIN_OVERLAP: usize = 16;

/// most subblocks a block can be split into
pub const MAX_SUBBLOCKS: usize = 4;

/// lowest codeable coefficient magnitude
pub const COEF_EPS: f32 = 1.0 / 2_147_483_648.0; // 2^-31

/// bias of the quantizer index
pub const QUANTIZER_BIAS: u8 = 5;

/// largest quantizer index (bias + extended range)
pub const QUANTIZER_MAX: u8 = QUANTIZER_BIAS + 0xE + 0x7;

// types

/// Window control code
///
/// Low nybble: `Dxxx`, where `xxx` is the overlap scale of the transient
/// subblock and `D` is set when the block is decimated. High nybble: the
/// decimation pattern, a unary-terminated bit path (`0001` = no decimation).
///
/// | Decimation | Subblocks (`*` = transient) |
/// |------------|-----------------------------|
/// | 0001       | N*                          |
/// | 001x       | N/2, N/2 (x = position)     |
/// | 01xx       | N/4, N/4, N/2 in some order |
/// | 1xxx       | N/8, N/8, N/4, N/2 in some order |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowCtrl(u8);

impl WindowCtrl {
    /// No decimation, full overlap
    pub const INITIAL: WindowCtrl = WindowCtrl(0x10);

    /// Pack a decimation path (1..=15) and overlap scale (0..=7)
    pub fn new(decimation: u8, overlap_scale: u8) -> Self {
        let decimation = decimation.clamp(1, 0xF);
        let flag = if decimation != 1 { 0x8 } else { 0x0 };
        WindowCtrl((overlap_scale & 0x7) | flag | (decimation << 4))
    }

    /// Validate a raw code
    pub fn from_code(code: u8) -> Option<Self> {
        let decimation = code >> 4;
        let flagged = code & 0x8 != 0;
        if decimation == 0 || flagged != (decimation != 1) {
            return None;
        }
        Some(WindowCtrl(code))
    }

    /// Raw 8-bit code
    pub fn code(self) -> u8 {
        self.0
    }

    /// Log2 overlap reduction of the transient subblock
    pub fn overlap_scale(self) -> u8 {
        self.0 & 0x7
    }

    /// Does this block split into subblocks?
    pub fn is_decimated(self) -> bool {
        self.0 & 0x8 != 0
    }

    /// Decimation path nybble
    pub fn decimation(self) -> u8 {
        self.0 >> 4
    }

    /// Number of halvings applied to the transient subblock
    pub fn depth(self) -> u32 {
        7 - self.decimation().leading_zeros()
    }

    /// Expand the code into its subblock layout
    pub fn pattern(self, block_size: usize) -> DecimationPattern {
        let decimation = self.decimation();
        let depth = self.depth();
        let scale = self.overlap_scale();

        let mut prefix = DecimationPattern::empty(scale);
        let mut suffix = DecimationPattern::empty(scale);
        for level in 1..=depth {
            let half = SubBlock {
                size: block_size >> level,
                transient: false,
            };
            if (decimation >> (depth - level)) & 1 != 0 {
                prefix.push_back(half);
            } else {
                suffix.push_front(half);
            }
        }

        prefix.push_back(SubBlock {
            size: block_size >> depth,
            transient: true,
        });
        for sb in suffix.iter() {
            prefix.push_back(*sb);
        }
        prefix
    }
}

impl Default for WindowCtrl {
    fn default() -> Self {
        WindowCtrl::INITIAL
    }
}

/// One transform unit inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBlock {
    /// Number of coefficients (and new samples)
    pub size: usize,
    /// Whether the overlap scale applies to this subblock
    pub transient: bool,
}

impl SubBlock {
    /// Overlap this subblock asks for at its left edge
    pub fn overlap(self, overlap_scale: u8) -> usize {
        if self.transient {
            self.size >> overlap_scale
        } else {
            self.size
        }
    }
}

/// Subblock layout of one block, in time order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimationPattern {
    subblocks: [SubBlock; MAX_SUBBLOCKS],
    len: usize,
    overlap_scale: u8,
}

impl DecimationPattern {
    fn empty(overlap_scale: u8) -> Self {
        Self {
            subblocks: [SubBlock {
                size: 0,
                transient: false,
            }; MAX_SUBBLOCKS],
            len: 0,
            overlap_scale,
        }
    }

    fn push_back(&mut self, sb: SubBlock) {
        if self.len < MAX_SUBBLOCKS {
            self.subblocks[self.len] = sb;
            self.len += 1;
        }
    }

    fn push_front(&mut self, sb: SubBlock) {
        if self.len < MAX_SUBBLOCKS {
            self.subblocks.copy_within(0..self.len, 1);
            self.subblocks[0] = sb;
            self.len += 1;
        }
    }

    /// Subblocks in time order
    pub fn iter(&self) -> std::slice::Iter<'_, SubBlock> {
        self.subblocks[..self.len].iter()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Subblock sizes in time order
    pub fn sizes(&self) -> Vec<usize> {
        self.iter().map(|sb| sb.size).collect()
    }

    /// Index of the transient subblock
    pub fn transient_index(&self) -> usize {
        self.iter().position(|sb| sb.transient).unwrap_or(0)
    }

    /// Overlap requested by subblock `idx`
    pub fn overlap_of(&self, idx: usize) -> usize {
        self.subblocks[idx].overlap(self.overlap_scale)
    }

    /// Overlap requested at the start of this block
    pub fn leading_overlap(&self) -> usize {
        self.overlap_of(0)
    }

    /// Overlap at the right edge of subblock `idx`, given the leading
    /// overlap of whatever follows this block
    pub fn right_overlap(&self, idx: usize, following: usize) -> usize {
        let next = if idx + 1 < self.len {
            self.overlap_of(idx + 1)
        } else {
            following
        };
        next.min(self.subblocks[idx].size)
    }
}

impl<'a> IntoIterator for &'a DecimationPattern {
    type Item = &'a SubBlock;
    type IntoIter = std::slice::Iter<'a, SubBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
