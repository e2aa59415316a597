//! # widx - Word Index
//!
//! widx builds a persistent on-disk index of word occurrences over a
//! directory of files and answers exact-prefix queries against it by
//! binary search, without decoding the index body.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`corpus`] - The directory-as-one-buffer view (offsets, mmap reads)
//! - [`scan`] - Line splitting and word extraction over the corpus
//! - [`index`] - Building, sorting, serializing, and querying the index
//! - [`output`] - Terminal formatting for query hits
//! - [`config`] - Build and search settings
//! - [`utils`] - Bit-packed I/O and progress reporting
//!
//! ## Quick Start
//!
//! ```ignore
//! use widx::{BuildConfig, SearchConfig, Searcher, build_index};
//!
//! // Index every first-word-per-line under ./docs.
//! let mut config = BuildConfig::new("./docs", r"(\w+)");
//! config.workers = 4;
//! let report = build_index(&config)?;
//! println!("{} entries indexed", report.entries);
//!
//! // Look up lines whose word starts with "aard".
//! let mut searcher = Searcher::open(&SearchConfig::new("./docs", "aard"))?;
//! for hit in searcher.search("aard")? {
//!     println!("{}: {:?}", hit.filename, hit.matched);
//! }
//! ```
//!
//! ## Index layout
//!
//! The index file is a magic tag, a replayable file table, and a
//! bit-packed array of occurrence positions sorted by the corpus bytes
//! they point at. Queries compare the query prefix against those bytes
//! through memory maps, so the entry array itself never needs to be
//! decoded into memory.

pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod output;
pub mod scan;
pub mod utils;

pub use config::{BuildConfig, SearchConfig};
pub use corpus::FileCorpus;
pub use error::{IndexError, Result};
pub use index::{BuildReport, LineMatch, Searcher, build_index};
pub use scan::WordScanner;
