//! Adaptive-width packing of (position, length) records.
//!
//! Widths are chosen per corpus from the measured maxima, so a small
//! corpus pays one byte per position instead of eight.

use std::ops::Range;

/// Widest possible record: 8 position bytes plus 4 length bytes.
pub const MAX_STRIDE: usize = 12;

/// Byte widths of one packed occurrence record.
///
/// Each field uses the smallest width whose `256^w` strictly exceeds
/// the corpus-wide maximum, so every measured value round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pos_width: usize,
    len_width: usize,
}

impl RecordLayout {
    /// Chooses widths for the given measured maxima.
    pub fn for_maxima(pos_max: u64, len_max: u32) -> RecordLayout {
        RecordLayout {
            pos_width: byte_width(pos_max, 8),
            len_width: byte_width(len_max as u64, 4),
        }
    }

    pub fn pos_width(&self) -> usize {
        self.pos_width
    }

    pub fn len_width(&self) -> usize {
        self.len_width
    }

    /// Bytes per record.
    pub fn stride(&self) -> usize {
        self.pos_width + self.len_width
    }

    /// Total table size in bytes for `entries` records.
    pub fn table_size(&self, entries: usize) -> usize {
        entries * self.stride()
    }

    /// Byte range of record `i` within the table.
    pub fn record_range(&self, i: usize) -> Range<usize> {
        let start = i * self.stride();
        start..start + self.stride()
    }

    /// Packs one record big-endian; the valid prefix is `stride` bytes.
    pub fn encode(&self, pos: u64, len: u32) -> ([u8; MAX_STRIDE], usize) {
        debug_assert!(self.pos_width == 8 || pos >> (8 * self.pos_width) == 0);
        debug_assert!(self.len_width == 4 || len >> (8 * self.len_width) == 0);
        let mut out = [0u8; MAX_STRIDE];
        let pos_bytes = pos.to_be_bytes();
        let len_bytes = len.to_be_bytes();
        out[..self.pos_width].copy_from_slice(&pos_bytes[8 - self.pos_width..]);
        out[self.pos_width..self.stride()].copy_from_slice(&len_bytes[4 - self.len_width..]);
        (out, self.stride())
    }

    /// Unpacks one record; `record` must be exactly `stride` bytes.
    pub fn decode(&self, record: &[u8]) -> (u64, u32) {
        debug_assert_eq!(record.len(), self.stride());
        let mut pos_bytes = [0u8; 8];
        pos_bytes[8 - self.pos_width..].copy_from_slice(&record[..self.pos_width]);
        let mut len_bytes = [0u8; 4];
        len_bytes[4 - self.len_width..].copy_from_slice(&record[self.pos_width..self.stride()]);
        (
            u64::from_be_bytes(pos_bytes),
            u32::from_be_bytes(len_bytes),
        )
    }
}

fn byte_width(max: u64, cap: usize) -> usize {
    let mut width = 1;
    let mut bound = 256u64;
    while width < cap {
        if bound > max {
            break;
        }
        bound = bound.saturating_mul(256);
        width += 1;
    }
    width
}

/// Smallest bit width `b >= 1` with `2^b` strictly greater than
/// `pos_max`, so the largest position survives serialization even when
/// it is an exact power of two.
pub fn position_bits(pos_max: u64) -> u32 {
    (64 - pos_max.leading_zeros()).max(1)
}
