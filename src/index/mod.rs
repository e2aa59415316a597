//! The on-disk occurrence index: layout, construction, and search.

pub mod build;
pub mod layout;
pub mod search;
pub mod sort;
pub mod table;
pub mod writer;

pub use build::{BuildReport, build_index};
pub use search::{LineMatch, Searcher};
pub use table::OccurrenceTable;

/// First five bytes of every index file.
pub const MAGIC: &[u8; 5] = b"INDEX";
