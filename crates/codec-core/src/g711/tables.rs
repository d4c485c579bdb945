//! Pre-computed μ-law lookup tables
//!
//! - encode table: 65536 bytes (one entry per 16-bit input)
//! - decode table: 512 bytes (256 samples × 2 bytes)

use super::reference::{ulaw_compress, ulaw_expand};
use std::sync::LazyLock;

static MULAW_ENCODE_TABLE: LazyLock<Box<[u8; 65536]>> = LazyLock::new(|| {
    let mut table = Box::new([0u8; 65536]);
    for (i, slot) in table.iter_mut().enumerate() {
        let sample = (i as u16).wrapping_sub(32768) as i16;
        *slot = ulaw_compress(sample);
    }
    table
});

static MULAW_DECODE_TABLE: LazyLock<[i16; 256]> = LazyLock::new(|| {
    let mut table = [0i16; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = ulaw_expand(i as u8);
    }
    table
});

/// O(1) μ-law compression
#[inline]
pub fn mulaw_compress_table(sample: i16) -> u8 {
    let index = (sample as u16).wrapping_add(32768) as usize;
    MULAW_ENCODE_TABLE[index]
}

/// O(1) μ-law expansion
#[inline]
pub fn mulaw_expand_table(encoded: u8) -> i16 {
    MULAW_DECODE_TABLE[encoded as usize]
}
