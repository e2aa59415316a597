//! Virtualized multi-file corpus.
//!
//! A [`FileCorpus`] presents a directory of files as one contiguous byte
//! space: each file occupies `[offset, offset + size)` and offsets are
//! cumulative, so a global position addresses exactly one byte of one
//! file. Random access never crosses a file boundary; sequential access
//! through a [`CorpusReader`] reports boundaries explicitly.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use memmap2::Mmap;
use once_cell::sync::OnceCell;

use crate::error::{IndexError, Result};

/// Low 48 bits of a header record hold the file size.
const SIZE_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Longest file name the 16-bit header field can carry.
const MAX_NAME_LEN: usize = 0xFFFF;

/// Largest file size the 48-bit header field can carry.
pub const MAX_FILE_SIZE: u64 = SIZE_MASK;

/// An ordered set of files addressed through one global byte space.
///
/// File handles and memory mappings are created lazily and cached per
/// file; the caches are safe to share across threads. Sequential
/// scanning does not use them; every [`CorpusReader`] owns its handle.
pub struct FileCorpus {
    base: PathBuf,
    names: Vec<String>,
    sizes: Vec<u64>,
    offsets: Vec<u64>,
    total: u64,
    handles: Vec<OnceCell<File>>,
    mappings: Vec<OnceCell<Mmap>>,
}

impl FileCorpus {
    /// Builds a corpus from the files under `base`, sorted by name.
    ///
    /// Skipped entries: directories, hidden names, empty files, names
    /// longer than 65535 bytes or not valid UTF-8, and files too large
    /// for the header's 48-bit size field. With `recursive`, the walk
    /// descends into subdirectories and names become relative paths.
    pub fn scan_directory(base: impl Into<PathBuf>, recursive: bool) -> Result<FileCorpus> {
        let base = base.into();
        fs::metadata(&base).map_err(|e| IndexError::file("scan", base.clone(), e))?;
        let mut entries = if recursive {
            Self::walk_entries(&base)
        } else {
            Self::list_entries(&base)?
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self::from_entries(base, entries))
    }

    fn list_entries(base: &Path) -> Result<Vec<(String, u64)>> {
        let dir = fs::read_dir(base).map_err(|e| IndexError::file("read", base, e))?;
        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| IndexError::file("read", base, e))?;
            let meta = entry
                .metadata()
                .map_err(|e| IndexError::file("stat", entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if Self::admissible(&name, meta.len()) {
                entries.push((name, meta.len()));
            }
        }
        Ok(entries)
    }

    fn walk_entries(base: &Path) -> Vec<(String, u64)> {
        let walker = WalkBuilder::new(base)
            .standard_filters(false)
            .hidden(true)
            .build();
        let mut entries = Vec::new();
        for entry in walker.flatten() {
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if !is_file {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let Ok(rel) = entry.path().strip_prefix(base) else {
                continue;
            };
            let Some(name) = rel.to_str().map(str::to_owned) else {
                continue;
            };
            if Self::admissible(&name, meta.len()) {
                entries.push((name, meta.len()));
            }
        }
        entries
    }

    fn admissible(name: &str, size: u64) -> bool {
        let hidden = name.split('/').any(|part| part.starts_with('.'));
        !name.is_empty()
            && !hidden
            && name.len() <= MAX_NAME_LEN
            && size > 0
            && size <= MAX_FILE_SIZE
    }

    fn from_entries(base: PathBuf, entries: Vec<(String, u64)>) -> FileCorpus {
        let mut names = Vec::with_capacity(entries.len());
        let mut sizes = Vec::with_capacity(entries.len());
        let mut offsets = Vec::with_capacity(entries.len());
        let mut total = 0u64;
        for (name, size) in entries {
            names.push(name);
            sizes.push(size);
            offsets.push(total);
            total += size;
        }
        let handles = (0..names.len()).map(|_| OnceCell::new()).collect();
        let mappings = (0..names.len()).map(|_| OnceCell::new()).collect();
        FileCorpus {
            base,
            names,
            sizes,
            offsets,
            total,
            handles,
            mappings,
        }
    }

    /// Reconstructs the file list from a serialized header stream.
    ///
    /// Reads records until the size-0 sentinel, consuming the sentinel's
    /// name bytes as well, so the stream is left positioned exactly at
    /// the first byte after the header.
    pub fn from_header<R: Read>(base: impl Into<PathBuf>, r: &mut R) -> Result<FileCorpus> {
        let mut entries = Vec::new();
        let mut total = 0u64;
        loop {
            let mut word = [0u8; 8];
            r.read_exact(&mut word)
                .map_err(|e| IndexError::malformed_header(format!("truncated record: {e}")))?;
            let word = u64::from_be_bytes(word);
            let size = word & SIZE_MASK;
            let name_len = (word >> 48) as usize;
            let mut name = vec![0u8; name_len];
            r.read_exact(&mut name)
                .map_err(|e| IndexError::malformed_header(format!("truncated name: {e}")))?;
            if size == 0 {
                break;
            }
            let name = String::from_utf8(name)
                .map_err(|_| IndexError::malformed_header("file name is not UTF-8"))?;
            total = total
                .checked_add(size)
                .ok_or_else(|| IndexError::malformed_header("corpus size overflows u64"))?;
            entries.push((name, size));
        }
        Ok(Self::from_entries(base.into(), entries))
    }

    /// Writes the replayable header: one record per file, then a
    /// sentinel record with size 0 and an empty name. Returns the byte
    /// count written.
    pub fn write_header<W: Write>(&self, w: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for (name, &size) in self.names.iter().zip(&self.sizes) {
            let word = ((name.len() as u64) << 48) | size;
            w.write_all(&word.to_be_bytes())?;
            w.write_all(name.as_bytes())?;
            written += 8 + name.len() as u64;
        }
        w.write_all(&0u64.to_be_bytes())?;
        Ok(written + 8)
    }

    pub fn file_count(&self) -> usize {
        self.names.len()
    }

    /// Total corpus size in bytes.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn file_name(&self, i: usize) -> &str {
        &self.names[i]
    }

    pub fn file_size(&self, i: usize) -> u64 {
        self.sizes[i]
    }

    pub fn file_offset(&self, i: usize) -> u64 {
        self.offsets[i]
    }

    pub fn file_path(&self, i: usize) -> PathBuf {
        self.base.join(&self.names[i])
    }

    /// Index of the file owning the byte at `offset`.
    pub fn offset_index(&self, offset: u64) -> Result<usize> {
        if offset >= self.total {
            return Err(IndexError::OffsetOutOfRange {
                offset,
                total: self.total,
            });
        }
        Ok(self.offsets.partition_point(|&o| o <= offset) - 1)
    }

    /// Name of the file owning the byte at `offset`.
    pub fn filename_at(&self, offset: u64) -> Result<&str> {
        Ok(&self.names[self.offset_index(offset)?])
    }

    fn handle(&self, i: usize) -> Result<&File> {
        self.handles[i].get_or_try_init(|| {
            File::open(self.file_path(i)).map_err(|e| IndexError::file("open", self.file_path(i), e))
        })
    }

    fn mapping(&self, i: usize) -> Result<&Mmap> {
        self.mappings[i].get_or_try_init(|| {
            let file = self.handle(i)?;
            unsafe { Mmap::map(file) }.map_err(|e| IndexError::file("map", self.file_path(i), e))
        })
    }

    /// Positioned read at a global offset, clipped to the end of the
    /// owning file. Returns the number of bytes read.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let idx = self.offset_index(offset)?;
        let local = offset - self.offsets[idx];
        let avail = self.sizes[idx] - local;
        let n = (buf.len() as u64).min(avail) as usize;
        let file = self.handle(idx)?;
        read_full_at(file, &mut buf[..n], local)
            .map_err(|e| IndexError::file("read", self.file_path(idx), e))?;
        Ok(n)
    }

    /// Borrowed window of `len` mapped bytes at a global offset.
    ///
    /// Fails if the window would extend past the end of the owning file;
    /// a mapping never spans two files.
    pub fn read_mapped(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let idx = self.offset_index(offset)?;
        let local = (offset - self.offsets[idx]) as usize;
        let avail = (self.sizes[idx] as usize) - local;
        if len > avail {
            return Err(IndexError::MappedReadCrossesFile {
                offset,
                len,
                file: self.names[idx].clone(),
            });
        }
        self.mapped_window(idx, local, local + len)
    }

    /// Like [`read_mapped`](Self::read_mapped), but clips the window to
    /// the end of the owning file instead of failing.
    pub fn read_mapped_clipped(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let idx = self.offset_index(offset)?;
        let local = (offset - self.offsets[idx]) as usize;
        let avail = (self.sizes[idx] as usize) - local;
        self.mapped_window(idx, local, local + len.min(avail))
    }

    fn mapped_window(&self, idx: usize, start: usize, end: usize) -> Result<&[u8]> {
        let map = self.mapping(idx)?;
        // A file shrunk since scanning can leave the mapping shorter
        // than the recorded size.
        map.get(start..end).ok_or_else(|| {
            IndexError::file(
                "read mapping of",
                self.file_path(idx),
                io::Error::new(io::ErrorKind::UnexpectedEof, "file shorter than recorded"),
            )
        })
    }

    /// Drops every cached handle and mapping. Idempotent; borrowed
    /// windows cannot outlive the corpus, so this is always safe.
    pub fn close(&mut self) {
        for cell in &mut self.handles {
            cell.take();
        }
        for cell in &mut self.mappings {
            cell.take();
        }
    }

    /// Sequential cursor positioned at the start of the corpus.
    pub fn reader(&self) -> CorpusReader<'_> {
        CorpusReader {
            remaining: if self.names.is_empty() { 0 } else { self.sizes[0] },
            corpus: self,
            file_idx: 0,
            handle: None,
        }
    }
}

#[cfg(unix)]
fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_full_at(file: &File, mut buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut pos = offset;
    while !buf.is_empty() {
        let n = file.seek_read(buf, pos)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        pos += n as u64;
        buf = &mut buf[n..];
    }
    Ok(())
}

/// One step of sequential corpus traversal.
#[derive(Debug, PartialEq, Eq)]
pub enum Chunk {
    /// `n` bytes of the current file were read into the buffer.
    Data(usize),
    /// The current file is exhausted; the cursor moved to the next one.
    FileEnd,
    /// No files remain.
    CorpusEnd,
}

/// Sequential reader over the whole corpus.
///
/// Owns its file handle, so any number of readers can traverse one
/// shared corpus concurrently. Reads are bounded by the recorded file
/// sizes; a file that grew since scanning is clipped, one that shrank
/// is an error.
pub struct CorpusReader<'c> {
    corpus: &'c FileCorpus,
    file_idx: usize,
    remaining: u64,
    handle: Option<File>,
}

impl CorpusReader<'_> {
    /// Reads the next chunk of the current file into `buf`.
    ///
    /// Yields [`Chunk::FileEnd`] exactly once after the last byte of
    /// every file, then [`Chunk::Data`] for the next file, and
    /// [`Chunk::CorpusEnd`] after the final file's end marker.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> Result<Chunk> {
        let count = self.corpus.file_count();
        if self.file_idx >= count {
            return Ok(Chunk::CorpusEnd);
        }
        if self.remaining == 0 {
            self.handle = None;
            self.file_idx += 1;
            if self.file_idx < count {
                self.remaining = self.corpus.file_size(self.file_idx);
            }
            return Ok(Chunk::FileEnd);
        }
        let want = (buf.len() as u64).min(self.remaining) as usize;
        let file = match self.handle {
            Some(ref mut f) => f,
            None => {
                let path = self.corpus.file_path(self.file_idx);
                let f = File::open(&path).map_err(|e| IndexError::file("open", path, e))?;
                self.handle.insert(f)
            }
        };
        let n = file
            .read(&mut buf[..want])
            .map_err(|e| IndexError::file("read", self.corpus.file_path(self.file_idx), e))?;
        if n == 0 {
            return Err(IndexError::file(
                "read",
                self.corpus.file_path(self.file_idx),
                io::Error::new(io::ErrorKind::UnexpectedEof, "file shorter than recorded"),
            ));
        }
        self.remaining -= n as u64;
        Ok(Chunk::Data(n))
    }

    /// Global offset of the next byte this reader will yield.
    pub fn offset(&self) -> u64 {
        if self.file_idx >= self.corpus.file_count() {
            return self.corpus.len();
        }
        self.corpus.file_offset(self.file_idx) + self.corpus.file_size(self.file_idx)
            - self.remaining
    }

    /// Repositions the cursor to a global offset.
    ///
    /// An offset equal to the corpus length positions at the end;
    /// anything beyond it is out of range.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let total = self.corpus.len();
        if offset > total {
            return Err(IndexError::OffsetOutOfRange { offset, total });
        }
        self.handle = None;
        if offset == total {
            self.file_idx = self.corpus.file_count();
            self.remaining = 0;
            return Ok(());
        }
        let idx = self.corpus.offset_index(offset)?;
        let local = offset - self.corpus.file_offset(idx);
        let path = self.corpus.file_path(idx);
        let mut file = File::open(&path).map_err(|e| IndexError::file("open", path, e))?;
        file.seek(SeekFrom::Start(local))
            .map_err(|e| IndexError::file("seek", self.corpus.file_path(idx), e))?;
        self.file_idx = idx;
        self.remaining = self.corpus.file_size(idx) - local;
        self.handle = Some(file);
        Ok(())
    }
}

impl Seek for CorpusReader<'_> {
    /// Only [`SeekFrom::Start`] is supported; the virtual space has no
    /// meaningful relative positions across its file seams.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(offset) => {
                self.seek_to(offset).map_err(io::Error::other)?;
                Ok(offset)
            }
            SeekFrom::Current(_) | SeekFrom::End(_) => {
                Err(io::Error::other(IndexError::UnsupportedSeek))
            }
        }
    }
}
