//! Build orchestration.
//!
//! A build is five strictly ordered phases over one corpus snapshot:
//! measure, layout, fill, sort, serialize. The measure pass sizes the
//! table and the serialized fields exactly; the fill pass may not push
//! more than was measured.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use tempfile::NamedTempFile;

use crate::config::BuildConfig;
use crate::corpus::FileCorpus;
use crate::error::{IndexError, Result};
use crate::index::layout::{self, RecordLayout};
use crate::index::sort;
use crate::index::table::OccurrenceTable;
use crate::index::writer;
use crate::scan::{ScanProgress, WordScanner};
use crate::utils::progress::{format_unit, run_phase};

/// Counts from one finished build, for the caller's summary line.
#[derive(Debug, Clone, Copy)]
pub struct BuildReport {
    pub files: usize,
    pub bytes: u64,
    pub entries: u64,
    pub index_size: u64,
}

/// Builds the index described by `config` from scratch.
///
/// Any stale index at the target path is removed before the corpus is
/// scanned, so an old index never gets indexed as content. The new
/// index is written to a temporary file in the target directory and
/// renamed into place only after a fully successful write.
pub fn build_index(config: &BuildConfig) -> Result<BuildReport> {
    let scanner = WordScanner::new(&config.pattern)?;
    remove_stale_index(&config.index_file)?;
    let corpus = FileCorpus::scan_directory(&config.dir, config.recursive)?;

    let measure_progress = ScanProgress::default();
    let stats = run_phase(
        "measure",
        || scan_status(&measure_progress),
        || scanner.measure(&corpus, config.workers, &measure_progress),
    )?;

    let layout = RecordLayout::for_maxima(stats.pos_max, stats.len_max);
    let pos_bits = layout::position_bits(stats.pos_max);
    let mut table = OccurrenceTable::new(&corpus, layout, stats.entries as usize);

    let fill_progress = ScanProgress::default();
    run_phase(
        "fill",
        || scan_status(&fill_progress),
        || scanner.fill(&corpus, config.workers, &fill_progress, &table),
    )?;

    let counters = table.counters();
    run_phase(
        "sort",
        move || {
            format!(
                "{} compares, {} swaps",
                format_unit(counters.compares.load(Relaxed)),
                format_unit(counters.swaps.load(Relaxed)),
            )
        },
        || sort::sort(&mut table),
    )?;

    let entries = table.len() as u64;
    let written = AtomicU64::new(0);
    let parent = config
        .index_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let index_size = run_phase(
        "write",
        || format!("{}/{} positions", written.load(Relaxed), entries),
        || {
            let mut tmp = NamedTempFile::new_in(parent)
                .map_err(|e| IndexError::file("create temporary index in", parent, e))?;
            let size = writer::write_index(tmp.as_file_mut(), &corpus, &table, pos_bits, &written)?;
            tmp.persist(&config.index_file)
                .map_err(|e| IndexError::file("persist", &config.index_file, e.error))?;
            Ok(size)
        },
    )?;

    Ok(BuildReport {
        files: corpus.file_count(),
        bytes: corpus.len(),
        entries,
        index_size,
    })
}

fn scan_status(progress: &ScanProgress) -> String {
    format!(
        "{}B scanned, {} words",
        format_unit(progress.bytes.load(Relaxed)),
        progress.entries.load(Relaxed),
    )
}

fn remove_stale_index(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::file("remove", path, e)),
    }
}
