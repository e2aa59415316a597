//! Serialized index emission.
//!
//! On-disk layout, all fields big-endian:
//! 1. the 5-byte magic,
//! 2. the replayable corpus header, sentinel included,
//! 3. a bit-packed body: 8-bit position width, 56-bit entry count,
//!    then one position per entry at the declared width, zero-padded
//!    to a whole final byte. Occurrence lengths are not persisted.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use crate::corpus::FileCorpus;
use crate::error::Result;
use crate::index::MAGIC;
use crate::index::table::OccurrenceTable;
use crate::utils::bits::BitWriter;

/// Bits occupied by the position width field and the entry count.
pub const BODY_HEADER_BITS: u64 = 8 + 56;

/// Writes the complete index for a sorted table. Returns the total
/// byte count; `written` counts emitted entries for progress readers.
pub fn write_index<W: Write>(
    w: &mut W,
    corpus: &FileCorpus,
    table: &OccurrenceTable<'_>,
    pos_bits: u32,
    written: &AtomicU64,
) -> Result<u64> {
    let mut total = MAGIC.len() as u64;
    w.write_all(MAGIC)?;
    total += corpus.write_header(w)?;

    let entries = table.len();
    let mut bits = BitWriter::new(&mut *w);
    bits.write(pos_bits as u64, 8)?;
    bits.write(entries as u64, 56)?;
    for i in 0..entries {
        let (pos, _len) = table.record(i);
        bits.write(pos, pos_bits)?;
        written.fetch_add(1, Relaxed);
    }
    bits.close()?;

    let body_bits = BODY_HEADER_BITS + entries as u64 * pos_bits as u64;
    Ok(total + body_bits.div_ceil(8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::layout::{RecordLayout, position_bits};
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn emits_magic_header_and_packed_positions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "ab cd ef\n").unwrap();
        let corpus = FileCorpus::scan_directory(dir.path(), false).unwrap();

        let table = OccurrenceTable::new(&corpus, RecordLayout::for_maxima(8, 2), 3);
        table.push(0, 2).unwrap();
        table.push(3, 2).unwrap();
        table.push(6, 2).unwrap();

        let pos_bits = position_bits(6);
        assert_eq!(pos_bits, 3);
        let written = AtomicU64::new(0);
        let mut out = Vec::new();
        let total = write_index(&mut out, &corpus, &table, pos_bits, &written).unwrap();
        assert_eq!(total as usize, out.len());
        assert_eq!(written.load(Relaxed), 3);

        assert_eq!(&out[..5], b"INDEX");
        let mut cur = Cursor::new(&out[5..]);
        let replayed = FileCorpus::from_header(dir.path(), &mut cur).unwrap();
        assert_eq!(replayed.file_count(), 1);
        assert_eq!(replayed.len(), 9);

        let mut bits = crate::utils::bits::BitReader::new(cur).unwrap();
        assert_eq!(bits.read_at(0, 8).unwrap(), 3);
        assert_eq!(bits.read_at(8, 56).unwrap(), 3);
        let positions: Vec<u64> = (0..3)
            .map(|i| bits.read_at(BODY_HEADER_BITS + i * 3, 3).unwrap())
            .collect();
        assert_eq!(positions, [0, 3, 6]);
    }
}
