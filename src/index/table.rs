//! Packed occurrence table.
//!
//! Records live in one flat byte buffer at a fixed stride. Appends are
//! lock-free so scan workers feed the table concurrently; comparison
//! and swapping are exclusive-access and run during the sort phase.

use std::cmp;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering::Relaxed};

use crate::corpus::FileCorpus;
use crate::error::{IndexError, Result};
use crate::index::layout::{MAX_STRIDE, RecordLayout};
use crate::index::sort::SortTable;

/// Comparison and swap totals, exposed for live progress reporting
/// while the table itself is exclusively borrowed by the sort.
#[derive(Default)]
pub struct SortCounters {
    pub compares: AtomicU64,
    pub swaps: AtomicU64,
}

struct CacheSlot<'c> {
    index: usize,
    pos: u64,
    window: &'c [u8],
}

/// Fixed-capacity table of (position, length) occurrence records.
///
/// Capacity comes from the measure pass and never grows. The table
/// borrows the corpus it indexes: comparator windows are served from
/// the corpus's cached mappings and stay valid as long as the table.
pub struct OccurrenceTable<'c> {
    data: Box<[AtomicU8]>,
    layout: RecordLayout,
    capacity: usize,
    count: AtomicUsize,
    corpus: &'c FileCorpus,
    cache: [Option<CacheSlot<'c>>; 2],
    counters: Arc<SortCounters>,
}

impl<'c> OccurrenceTable<'c> {
    pub fn new(corpus: &'c FileCorpus, layout: RecordLayout, capacity: usize) -> Self {
        let data: Box<[AtomicU8]> = (0..layout.table_size(capacity))
            .map(|_| AtomicU8::new(0))
            .collect();
        OccurrenceTable {
            data,
            layout,
            capacity,
            count: AtomicUsize::new(0),
            corpus,
            cache: [None, None],
            counters: Arc::new(SortCounters::default()),
        }
    }

    /// Appends a record, claiming a slot with one atomic increment.
    ///
    /// Slots are disjoint, so the relaxed byte stores cannot race;
    /// joining the scan workers publishes them to the sorting thread.
    pub fn push(&self, pos: u64, len: u32) -> Result<()> {
        let slot = self.count.fetch_add(1, Relaxed);
        if slot >= self.capacity {
            self.count.fetch_sub(1, Relaxed);
            return Err(IndexError::TableFull {
                capacity: self.capacity,
            });
        }
        let (bytes, stride) = self.layout.encode(pos, len);
        let start = slot * stride;
        for (k, &byte) in bytes[..stride].iter().enumerate() {
            self.data[start + k].store(byte, Relaxed);
        }
        Ok(())
    }

    /// Records appended so far.
    pub fn len(&self) -> usize {
        self.count.load(Relaxed).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Decodes record `i` into (position, length).
    pub fn record(&self, i: usize) -> (u64, u32) {
        let range = self.layout.record_range(i);
        let mut buf = [0u8; MAX_STRIDE];
        for (byte, cell) in buf.iter_mut().zip(&self.data[range]) {
            *byte = cell.load(Relaxed);
        }
        self.layout.decode(&buf[..self.layout.stride()])
    }

    /// Corpus bytes at record `i`'s position, clipped to the owning
    /// file's end. This is the window the comparator orders by.
    pub fn window(&self, i: usize) -> Result<&'c [u8]> {
        let (pos, len) = self.record(i);
        self.corpus.read_mapped_clipped(pos, len as usize)
    }

    /// Handle on the sort counters for a progress reader to hold while
    /// the sort owns the table.
    pub fn counters(&self) -> Arc<SortCounters> {
        Arc::clone(&self.counters)
    }

    /// Record `i`'s corpus window with its position, through the two
    /// cache slots: slot 0 tracks the left comparand, slot 1 the right.
    fn cached(&mut self, slot: usize, index: usize) -> Result<(u64, &'c [u8])> {
        if let Some(ref hit) = self.cache[slot] {
            if hit.index == index {
                return Ok((hit.pos, hit.window));
            }
        }
        let (pos, len) = self.record(index);
        let window = self.corpus.read_mapped_clipped(pos, len as usize)?;
        self.cache[slot] = Some(CacheSlot { index, pos, window });
        Ok((pos, window))
    }
}

impl SortTable for OccurrenceTable<'_> {
    fn len(&self) -> usize {
        self.count.load(Relaxed).min(self.capacity)
    }

    /// Lexicographic order of the corpus bytes at each record's
    /// position, clipped to the owning file; equal windows fall back to
    /// position order so the result is a total order.
    fn less(&mut self, i: usize, j: usize) -> Result<bool> {
        let (pos_a, win_a) = self.cached(0, i)?;
        let (pos_b, win_b) = self.cached(1, j)?;
        self.counters.compares.fetch_add(1, Relaxed);
        Ok(match win_a.cmp(win_b) {
            cmp::Ordering::Less => true,
            cmp::Ordering::Greater => false,
            cmp::Ordering::Equal => pos_a < pos_b,
        })
    }

    fn swap(&mut self, i: usize, j: usize) {
        let start_i = self.layout.record_range(i).start;
        let start_j = self.layout.record_range(j).start;
        for k in 0..self.layout.stride() {
            let a = self.data[start_i + k].load(Relaxed);
            let b = self.data[start_j + k].load(Relaxed);
            self.data[start_i + k].store(b, Relaxed);
            self.data[start_j + k].store(a, Relaxed);
        }
        self.counters.swaps.fetch_add(1, Relaxed);
        // Swapped records carry their cached windows with them.
        for slot in self.cache.iter_mut().flatten() {
            if slot.index == i {
                slot.index = j;
            } else if slot.index == j {
                slot.index = i;
            }
        }
    }
}
