pub type Byte = u8;
pub type Word = u16;

pub const BYTE_WIDTH: usize = 8;
pub const WORD_WIDTH: usize = 16;
pub const WORD_MAX: Word = 0xFFFF;

/// Every instruction slot occupies this many bytes, so program label
/// addresses can be assigned in a single forward pass without knowing
/// the operand encodings.
pub const INST_WIDTH: Word = 4;

/// Reinterprets the low 16 bits of `i`, two's-complement for negatives.
pub fn word_from_i64_truncating(i: i64) -> Word {
    i as Word
}
