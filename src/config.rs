//! Build and search configuration.

use std::path::{Path, PathBuf};

/// File name used when no explicit index path is given. The leading
/// dot keeps the index itself out of corpus scans.
pub const DEFAULT_INDEX_NAME: &str = ".index";

pub fn default_index_file(dir: &Path) -> PathBuf {
    dir.join(DEFAULT_INDEX_NAME)
}

/// Settings for one full index build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory whose files form the corpus.
    pub dir: PathBuf,
    /// Where the finished index lands.
    pub index_file: PathBuf,
    /// Word pattern; capture group 1 (or the whole match) is indexed.
    pub pattern: String,
    /// Scan worker count; 1 scans the corpus on the calling thread.
    pub workers: usize,
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl BuildConfig {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> BuildConfig {
        let dir = dir.into();
        BuildConfig {
            index_file: default_index_file(&dir),
            dir,
            pattern: pattern.into(),
            workers: 1,
            recursive: false,
        }
    }
}

/// Settings for querying an existing index.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Directory the indexed files live in.
    pub dir: PathBuf,
    /// Index file to open.
    pub index_file: PathBuf,
    /// Exact prefix to look up.
    pub query: String,
}

impl SearchConfig {
    pub fn new(dir: impl Into<PathBuf>, query: impl Into<String>) -> SearchConfig {
        let dir = dir.into();
        SearchConfig {
            index_file: default_index_file(&dir),
            dir,
            query: query.into(),
        }
    }
}
