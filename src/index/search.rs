//! Query-time lookup over a finished index.
//!
//! The entry body is never decoded up front. A binary search probes
//! packed positions one at a time and compares the mapped corpus bytes
//! at each probe against the query, so a lookup touches O(log n)
//! entries no matter how large the index is.

use std::fs::File;
use std::io::Read;

use memchr::{memchr, memrchr};

use crate::config::SearchConfig;
use crate::corpus::FileCorpus;
use crate::error::{IndexError, Result};
use crate::index::writer::BODY_HEADER_BITS;
use crate::index::MAGIC;
use crate::utils::bits::BitReader;

/// Longest query prefix actually compared.
const MAX_QUERY: usize = 4096;

/// Context is fetched in blocks this size, starting one block before
/// the block holding the match, so the line start is almost always in
/// the buffer.
const CONTEXT_BLOCK: u64 = 1024;
const CONTEXT_WINDOW: usize = 4096;

/// One hit, with its line split around the matched bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub filename: String,
    pub position: u64,
    pub before: Vec<u8>,
    pub matched: Vec<u8>,
    pub after: Vec<u8>,
}

/// Binary-searches sorted occurrence positions against mapped corpus
/// bytes.
pub struct Searcher {
    corpus: FileCorpus,
    bits: BitReader<File>,
    pos_bits: u32,
    entries: u64,
}

impl Searcher {
    /// Opens `config.index_file` and replays its header against
    /// `config.dir`.
    pub fn open(config: &SearchConfig) -> Result<Searcher> {
        let mut file = File::open(&config.index_file)
            .map_err(|e| IndexError::file("open", &config.index_file, e))?;
        let mut magic = [0u8; MAGIC.len()];
        file.read_exact(&mut magic).map_err(|_| IndexError::BadMagic)?;
        if &magic != MAGIC {
            return Err(IndexError::BadMagic);
        }
        let corpus = FileCorpus::from_header(&config.dir, &mut file)?;
        let mut bits = BitReader::new(file)?;
        let pos_bits = bits.read_at(0, 8)? as u32;
        if !(1..=64).contains(&pos_bits) {
            return Err(IndexError::malformed_header(format!(
                "position width {pos_bits} out of range"
            )));
        }
        let entries = bits.read_at(8, 56)?;
        Ok(Searcher {
            corpus,
            bits,
            pos_bits,
            entries,
        })
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    fn position(&mut self, i: u64) -> Result<u64> {
        self.bits
            .read_at(BODY_HEADER_BITS + i * self.pos_bits as u64, self.pos_bits)
    }

    /// True when the corpus bytes at entry `i` sort strictly before
    /// `q`. Windows clipped short by a file end compare as prefixes,
    /// which orders them first among entries sharing those bytes.
    fn window_less_than(&mut self, i: u64, q: &[u8]) -> Result<bool> {
        let pos = self.position(i)?;
        let window = self.corpus.read_mapped_clipped(pos, q.len())?;
        Ok(window < q)
    }

    /// All lines whose indexed word starts with `query`, in entry
    /// order. An empty query matches every entry.
    pub fn search(&mut self, query: &str) -> Result<Vec<LineMatch>> {
        let q = &query.as_bytes()[..query.len().min(MAX_QUERY)];

        // Lower bound: first entry not less than the query.
        let mut lo = 0u64;
        let mut hi = self.entries;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.window_less_than(mid, q)? {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut matches = Vec::new();
        let mut i = lo;
        while i < self.entries {
            let pos = self.position(i)?;
            let window = self.corpus.read_mapped_clipped(pos, q.len())?;
            if window != q {
                break;
            }
            matches.push(self.line_match(pos, q.len())?);
            i += 1;
        }
        Ok(matches)
    }

    /// Rebuilds the full line around a hit from a context window read
    /// out of the owning file.
    fn line_match(&self, pos: u64, match_len: usize) -> Result<LineMatch> {
        let file_idx = self.corpus.offset_index(pos)?;
        let file_start = self.corpus.file_offset(file_idx);
        let base = ((pos / CONTEXT_BLOCK).saturating_sub(1) * CONTEXT_BLOCK).max(file_start);
        let mut buf = vec![0u8; CONTEXT_WINDOW];
        let n = self.corpus.read_at(base, &mut buf)?;
        let buf = &buf[..n];

        let local = (pos - base) as usize;
        let line_start = memrchr(b'\n', &buf[..local]).map(|p| p + 1).unwrap_or(0);
        // The highlight never runs past the fetched window.
        let match_end = (local + match_len).min(n);
        let mut line_end = memchr(b'\n', &buf[match_end..])
            .map(|p| match_end + p)
            .unwrap_or(n);
        if line_end > match_end && buf[line_end - 1] == b'\r' {
            line_end -= 1;
        }

        Ok(LineMatch {
            filename: self.corpus.file_name(file_idx).to_string(),
            position: pos,
            before: buf[line_start..local].to_vec(),
            matched: buf[local..match_end].to_vec(),
            after: buf[match_end..line_end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_index(dir: &TempDir, bytes: &[u8]) -> SearchConfig {
        let mut config = SearchConfig::new(dir.path(), "x");
        config.index_file = dir.path().join("crafted");
        fs::write(&config.index_file, bytes).unwrap();
        config
    }

    #[test]
    fn rejects_wrong_and_truncated_magic() {
        let dir = TempDir::new().unwrap();
        let config = config_with_index(&dir, b"NOTANINDEX");
        assert!(matches!(Searcher::open(&config), Err(IndexError::BadMagic)));

        let config = config_with_index(&dir, b"IN");
        assert!(matches!(Searcher::open(&config), Err(IndexError::BadMagic)));
    }

    #[test]
    fn rejects_position_width_outside_word_range() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"INDEX".to_vec();
        bytes.extend_from_slice(&0u64.to_be_bytes()); // header sentinel
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]); // width 0
        let config = config_with_index(&dir, &bytes);
        assert!(matches!(
            Searcher::open(&config),
            Err(IndexError::MalformedHeader(_))
        ));
    }

    #[test]
    fn empty_index_answers_every_query_with_nothing() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"INDEX".to_vec();
        bytes.extend_from_slice(&0u64.to_be_bytes());
        bytes.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]); // width 1, no entries
        let config = config_with_index(&dir, &bytes);
        let mut searcher = Searcher::open(&config).unwrap();
        assert_eq!(searcher.entries(), 0);
        assert!(searcher.search("anything").unwrap().is_empty());
        assert!(searcher.search("").unwrap().is_empty());
    }
}
