//! Shared utilities.
//!
//! - [`bits`] - bit-granular reading and writing of the index body
//! - [`progress`] - phase ticker and human-readable unit formatting

pub mod bits;
pub mod progress;

pub use bits::{BitReader, BitWriter};
pub use progress::{format_unit, run_phase};
