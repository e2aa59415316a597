use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by corpus access, index construction, and search.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A filesystem operation failed on a specific path.
    #[error("failed to {op} {}: {source}", path.display())]
    File {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An I/O error with no single path attached (stream reads and writes).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index file does not start with the expected magic bytes.
    #[error("not an index file (bad magic)")]
    BadMagic,

    /// The serialized corpus header could not be replayed.
    #[error("malformed index header: {0}")]
    MalformedHeader(String),

    /// The word pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A bit width outside the supported range was requested.
    #[error("bit width {width} out of range (1..={max})")]
    CodecWidth { width: u32, max: u32 },

    /// A mapped window would extend past the end of the file that owns it.
    #[error("mapped read of {len} bytes at offset {offset} crosses the end of {file}")]
    MappedReadCrossesFile {
        offset: u64,
        len: usize,
        file: String,
    },

    /// An offset beyond the end of the corpus was addressed.
    #[error("offset {offset} out of range (corpus is {total} bytes)")]
    OffsetOutOfRange { offset: u64, total: u64 },

    /// Corpus cursors reposition from the start only.
    #[error("seek is only supported from the start of the corpus")]
    UnsupportedSeek,

    /// More occurrences were pushed than the measure pass counted.
    #[error("occurrence table is full ({capacity} slots)")]
    TableFull { capacity: usize },

    /// The scan worker pool could not be constructed.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    /// Attaches an operation name and path to an I/O error.
    pub fn file(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::File {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn malformed_header(message: impl Into<String>) -> Self {
        IndexError::MalformedHeader(message.into())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
