//! Word scanning over corpus lines.
//!
//! A [`WordScanner`] runs one pattern match per line and records where
//! the matched word sits in the global byte space. The same traversal
//! runs twice per build: a measure pass that only gathers statistics,
//! then a fill pass that also appends to the occurrence table.

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering::Relaxed};
use std::sync::mpsc;

use memchr::memchr;
use regex::bytes::Regex;

use crate::corpus::{Chunk, CorpusReader, FileCorpus};
use crate::error::{IndexError, Result};
use crate::index::table::OccurrenceTable;

const SCAN_CHUNK: usize = 64 * 1024;

/// Live byte and entry totals, updated by every worker and read by the
/// progress ticker.
#[derive(Default)]
pub struct ScanProgress {
    pub bytes: AtomicU64,
    pub entries: AtomicU64,
}

/// Running statistics of one scan pass.
///
/// Minima are `Option` so a word at global position zero reads as a
/// real minimum rather than "none seen".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes: u64,
    pub entries: u64,
    pub pos_min: Option<u64>,
    pub pos_max: u64,
    pub len_min: Option<u32>,
    pub len_max: u32,
}

impl ScanStats {
    fn note(&mut self, pos: u64, len: u32) {
        self.entries += 1;
        self.pos_min = Some(self.pos_min.map_or(pos, |m| m.min(pos)));
        self.pos_max = self.pos_max.max(pos);
        self.len_min = Some(self.len_min.map_or(len, |m| m.min(len)));
        self.len_max = self.len_max.max(len);
    }

    pub fn merge(&mut self, other: &ScanStats) {
        self.bytes += other.bytes;
        self.entries += other.entries;
        self.pos_min = merge_min(self.pos_min, other.pos_min);
        self.pos_max = self.pos_max.max(other.pos_max);
        self.len_min = merge_min(self.len_min, other.len_min);
        self.len_max = self.len_max.max(other.len_max);
    }
}

fn merge_min<T: Ord + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

/// Splits a contiguous byte stream into lines, carrying partial lines
/// across chunk boundaries and tracking each line's global offset.
struct LineSplitter {
    carry: Vec<u8>,
    cursor: u64,
}

impl LineSplitter {
    fn new(start: u64) -> Self {
        LineSplitter {
            carry: Vec::new(),
            cursor: start,
        }
    }

    fn feed<F>(&mut self, mut chunk: &[u8], f: &mut F) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> Result<()>,
    {
        while let Some(nl) = memchr(b'\n', chunk) {
            let line_start = self.cursor - self.carry.len() as u64;
            if self.carry.is_empty() {
                f(line_start, trim_line_end(&chunk[..nl]))?;
            } else {
                self.carry.extend_from_slice(&chunk[..nl]);
                f(line_start, trim_line_end(&self.carry))?;
                self.carry.clear();
            }
            self.cursor += (nl + 1) as u64;
            chunk = &chunk[nl + 1..];
        }
        self.carry.extend_from_slice(chunk);
        self.cursor += chunk.len() as u64;
        Ok(())
    }

    /// Emits any pending partial line; called at file boundaries so a
    /// line never spans two files.
    fn flush<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(u64, &[u8]) -> Result<()>,
    {
        if !self.carry.is_empty() {
            let line_start = self.cursor - self.carry.len() as u64;
            f(line_start, trim_line_end(&self.carry))?;
            self.carry.clear();
        }
        Ok(())
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

type Sink<'s> = dyn Fn(u64, u32) -> Result<()> + Sync + 's;

/// Pattern-driven occurrence extractor.
pub struct WordScanner {
    pattern: Regex,
    has_group: bool,
}

impl WordScanner {
    /// Compiles the word pattern.
    ///
    /// With capture groups, group 1 is the word; without, the whole
    /// match is.
    pub fn new(pattern: &str) -> Result<WordScanner> {
        let pattern = Regex::new(pattern)?;
        let has_group = pattern.captures_len() > 1;
        Ok(WordScanner { pattern, has_group })
    }

    /// Measure pass: statistics only.
    pub fn measure(
        &self,
        corpus: &FileCorpus,
        workers: usize,
        progress: &ScanProgress,
    ) -> Result<ScanStats> {
        self.run(corpus, workers, progress, &|_, _| Ok(()))
    }

    /// Fill pass: statistics plus one table append per occurrence.
    pub fn fill(
        &self,
        corpus: &FileCorpus,
        workers: usize,
        progress: &ScanProgress,
        table: &OccurrenceTable<'_>,
    ) -> Result<ScanStats> {
        self.run(corpus, workers, progress, &|pos, len| table.push(pos, len))
    }

    fn run(
        &self,
        corpus: &FileCorpus,
        workers: usize,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<ScanStats> {
        if workers > 1 {
            self.scan_parallel(corpus, workers, progress, sink)
        } else {
            self.scan_corpus(&mut corpus.reader(), progress, sink)
        }
    }

    /// One match attempt per line; the span must be non-empty and, with
    /// groups, group 1 must have participated.
    fn word_span(&self, line: &[u8]) -> Option<(usize, usize)> {
        if self.has_group {
            let caps = self.pattern.captures(line)?;
            let m = caps.get(1)?;
            Some((m.start(), m.end()))
        } else {
            let m = self.pattern.find(line)?;
            Some((m.start(), m.end()))
        }
    }

    fn handle_line(
        &self,
        line_start: u64,
        line: &[u8],
        stats: &mut ScanStats,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<()> {
        let Some((start, end)) = self.word_span(line) else {
            return Ok(());
        };
        if end == start {
            return Ok(());
        }
        let pos = line_start + start as u64;
        let len = (end - start) as u32;
        stats.note(pos, len);
        progress.entries.fetch_add(1, Relaxed);
        sink(pos, len)
    }

    /// Whole-corpus traversal on the calling thread. Partial lines are
    /// flushed at every file end, so the occurrence set matches what
    /// per-file workers produce.
    fn scan_corpus(
        &self,
        reader: &mut CorpusReader<'_>,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        let mut splitter = LineSplitter::new(reader.offset());
        let mut buf = vec![0u8; SCAN_CHUNK];
        loop {
            match reader.next_chunk(&mut buf)? {
                Chunk::Data(n) => {
                    stats.bytes += n as u64;
                    progress.bytes.fetch_add(n as u64, Relaxed);
                    splitter.feed(&buf[..n], &mut |ls, line| {
                        self.handle_line(ls, line, &mut stats, progress, sink)
                    })?;
                }
                Chunk::FileEnd => {
                    splitter.flush(&mut |ls, line| {
                        self.handle_line(ls, line, &mut stats, progress, sink)
                    })?;
                }
                Chunk::CorpusEnd => break,
            }
        }
        Ok(stats)
    }

    /// One bounded byte stream, typically a single file.
    fn scan_stream<R: Read>(
        &self,
        r: &mut R,
        base: u64,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        let mut splitter = LineSplitter::new(base);
        let mut buf = vec![0u8; SCAN_CHUNK];
        loop {
            let n = r.read(&mut buf)?;
            if n == 0 {
                break;
            }
            stats.bytes += n as u64;
            progress.bytes.fetch_add(n as u64, Relaxed);
            splitter.feed(&buf[..n], &mut |ls, line| {
                self.handle_line(ls, line, &mut stats, progress, sink)
            })?;
        }
        splitter.flush(&mut |ls, line| self.handle_line(ls, line, &mut stats, progress, sink))?;
        Ok(stats)
    }

    /// File-sharded scan on a dedicated pool of exactly `workers`
    /// threads. A shared counter hands out file indices; each worker
    /// opens its own handle bounded to the recorded size and reports a
    /// per-file snapshot. The first failure flips a flag that stops
    /// siblings from claiming further files.
    fn scan_parallel(
        &self,
        corpus: &FileCorpus,
        workers: usize,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<ScanStats> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        let next_file = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<Result<ScanStats>>();

        pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next_file = &next_file;
                let failed = &failed;
                scope.spawn(move |_| {
                    loop {
                        if failed.load(Relaxed) {
                            break;
                        }
                        let i = next_file.fetch_add(1, Relaxed);
                        if i >= corpus.file_count() {
                            break;
                        }
                        let result = self.scan_file(corpus, i, progress, sink);
                        let is_err = result.is_err();
                        if is_err {
                            failed.store(true, Relaxed);
                        }
                        if tx.send(result).is_err() || is_err {
                            break;
                        }
                    }
                });
            }
            drop(tx);
        });

        let mut total = ScanStats::default();
        let mut first_err = None;
        for snapshot in rx {
            match snapshot {
                Ok(stats) => total.merge(&stats),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    fn scan_file(
        &self,
        corpus: &FileCorpus,
        i: usize,
        progress: &ScanProgress,
        sink: &Sink<'_>,
    ) -> Result<ScanStats> {
        let path = corpus.file_path(i);
        let file = File::open(&path).map_err(|e| IndexError::file("open", path, e))?;
        let mut bounded = file.take(corpus.file_size(i));
        self.scan_stream(&mut bounded, corpus.file_offset(i), progress, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::layout::RecordLayout;
    use std::fs;
    use tempfile::TempDir;

    fn corpus_of(files: &[(&str, &str)]) -> (TempDir, FileCorpus) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let corpus = FileCorpus::scan_directory(dir.path(), false).unwrap();
        (dir, corpus)
    }

    fn measure(pattern: &str, corpus: &FileCorpus, workers: usize) -> ScanStats {
        let scanner = WordScanner::new(pattern).unwrap();
        scanner
            .measure(corpus, workers, &ScanProgress::default())
            .unwrap()
    }

    #[test]
    fn splitter_tracks_offsets_across_tiny_chunks() {
        let mut splitter = LineSplitter::new(0);
        let mut lines: Vec<(u64, Vec<u8>)> = Vec::new();
        for byte in b"ab\ncdef\n\ngh" {
            splitter
                .feed(std::slice::from_ref(byte), &mut |ls, line| {
                    lines.push((ls, line.to_vec()));
                    Ok(())
                })
                .unwrap();
        }
        splitter
            .flush(&mut |ls, line| {
                lines.push((ls, line.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            lines,
            vec![
                (0, b"ab".to_vec()),
                (3, b"cdef".to_vec()),
                (8, b"".to_vec()),
                (9, b"gh".to_vec()),
            ]
        );
    }

    #[test]
    fn first_word_per_line_with_capture_group() {
        let (_dir, corpus) = corpus_of(&[("a.txt", "one two\nthree\n")]);
        let stats = measure(r"(\w+)", &corpus, 1);
        // One attempt per line: "two" is never visited.
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.pos_min, Some(0));
        assert_eq!(stats.pos_max, 8);
        assert_eq!(stats.len_min, Some(3));
        assert_eq!(stats.len_max, 5);
        assert_eq!(stats.bytes, 14);
    }

    #[test]
    fn whole_match_when_pattern_has_no_groups() {
        let (_dir, corpus) = corpus_of(&[("a.txt", "  indented word\n")]);
        let stats = measure(r"\w+", &corpus, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.pos_min, Some(2));
        assert_eq!(stats.len_max, 8);
    }

    #[test]
    fn degenerate_matches_are_skipped() {
        let (_dir, corpus) = corpus_of(&[("a.txt", "yyy\nzzz\n")]);
        // Matches an empty span at the start of every line.
        let stats = measure(r"(x*)", &corpus, 1);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.pos_min, None);
        assert_eq!(stats.len_min, None);

        // Group 1 participates only when "foo" matches.
        let stats = measure(r"(foo)|bar", &corpus, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn crlf_lines_are_trimmed() {
        let (_dir, corpus) = corpus_of(&[("a.txt", "hello\r\nworld\r\n")]);
        let stats = measure(r"(\w+)", &corpus, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.len_max, 5);
        assert_eq!(stats.pos_max, 7);
    }

    #[test]
    fn unterminated_final_line_is_scanned() {
        let (_dir, corpus) = corpus_of(&[("a.txt", "first\nlast")]);
        let stats = measure(r"(\w+)", &corpus, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.pos_max, 6);
        assert_eq!(stats.len_max, 5);
    }

    #[test]
    fn lines_never_span_file_boundaries() {
        // Neither file ends with a newline; the halves must not fuse
        // into one "abcdef" line.
        let (_dir, corpus) = corpus_of(&[("a.txt", "abc"), ("b.txt", "def")]);
        let stats = measure(r"(\w+)", &corpus, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.pos_min, Some(0));
        assert_eq!(stats.pos_max, 3);
        assert_eq!(stats.len_max, 3);
    }

    #[test]
    fn worker_counts_agree_on_the_occurrence_set() {
        let files: Vec<(String, String)> = (0..8)
            .map(|i| {
                let name = format!("f{i}.txt");
                let body = (0..20)
                    .map(|j| format!("word{i}x{j} trailing\n"))
                    .collect::<String>();
                (name, body)
            })
            .collect();
        let dir = TempDir::new().unwrap();
        for (name, body) in &files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let corpus = FileCorpus::scan_directory(dir.path(), false).unwrap();
        let scanner = WordScanner::new(r"(\w+)").unwrap();

        let serial = scanner
            .measure(&corpus, 1, &ScanProgress::default())
            .unwrap();
        let parallel = scanner
            .measure(&corpus, 4, &ScanProgress::default())
            .unwrap();
        assert_eq!(serial, parallel);

        let collect = |workers: usize| -> Vec<(u64, u32)> {
            let layout = RecordLayout::for_maxima(serial.pos_max, serial.len_max);
            let table = OccurrenceTable::new(&corpus, layout, serial.entries as usize);
            scanner
                .fill(&corpus, workers, &ScanProgress::default(), &table)
                .unwrap();
            let mut records: Vec<(u64, u32)> = (0..table.len()).map(|i| table.record(i)).collect();
            records.sort_unstable();
            records
        };
        assert_eq!(collect(1), collect(4));
    }

    #[test]
    fn parallel_fill_propagates_push_errors() {
        let (_dir, corpus) = corpus_of(&[
            ("a.txt", "alpha\nbeta\ngamma\n"),
            ("b.txt", "delta\nepsilon\n"),
        ]);
        let scanner = WordScanner::new(r"(\w+)").unwrap();
        let table = OccurrenceTable::new(&corpus, RecordLayout::for_maxima(100, 10), 1);
        let err = scanner
            .fill(&corpus, 2, &ScanProgress::default(), &table)
            .unwrap_err();
        assert!(matches!(err, IndexError::TableFull { capacity: 1 }));
    }
}
