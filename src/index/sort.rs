//! In-place comparison sort over an indexable table.
//!
//! The occurrence table compares records by dereferencing corpus bytes,
//! which can fail, so the usual `Ord`-based sorts do not fit. This sort
//! drives any [`SortTable`] and aborts on the first comparator error.

use crate::error::Result;

/// Sortable collection addressed by index.
///
/// `less` takes `&mut self` so implementations can keep comparison
/// caches; `swap` must keep any such cache coherent.
pub trait SortTable {
    fn len(&self) -> usize;
    fn less(&mut self, i: usize, j: usize) -> Result<bool>;
    fn swap(&mut self, i: usize, j: usize);
}

/// Ranges at or below this length use insertion sort.
const INSERTION_THRESHOLD: usize = 12;

/// Sorts the table in place: quicksort with median-of-three pivots,
/// insertion sort for short ranges, heapsort past the depth limit.
pub fn sort<T: SortTable>(table: &mut T) -> Result<()> {
    let n = table.len();
    if n > 1 {
        let depth_limit = 2 * (usize::BITS - n.leading_zeros());
        introsort(table, 0, n, depth_limit)?;
    }
    Ok(())
}

fn introsort<T: SortTable>(t: &mut T, mut lo: usize, mut hi: usize, mut depth: u32) -> Result<()> {
    while hi - lo > INSERTION_THRESHOLD {
        if depth == 0 {
            return heapsort(t, lo, hi);
        }
        depth -= 1;
        let p = partition(t, lo, hi)?;
        // Recurse into the smaller side, iterate on the larger one, so
        // stack depth stays logarithmic.
        if p - lo < hi - p {
            introsort(t, lo, p, depth)?;
            lo = p + 1;
        } else {
            introsort(t, p + 1, hi, depth)?;
            hi = p;
        }
    }
    insertion_sort(t, lo, hi)
}

/// Lomuto partition around the median of first, middle, and last.
/// Returns the pivot's final index.
fn partition<T: SortTable>(t: &mut T, lo: usize, hi: usize) -> Result<usize> {
    let mid = lo + (hi - lo) / 2;
    median_to_last(t, lo, mid, hi - 1)?;
    let pivot = hi - 1;
    let mut store = lo;
    for i in lo..pivot {
        if t.less(i, pivot)? {
            if i != store {
                t.swap(store, i);
            }
            store += 1;
        }
    }
    if store != pivot {
        t.swap(store, pivot);
    }
    Ok(store)
}

fn median_to_last<T: SortTable>(t: &mut T, a: usize, b: usize, c: usize) -> Result<()> {
    if t.less(b, a)? {
        t.swap(a, b);
    }
    if t.less(c, b)? {
        t.swap(b, c);
    }
    if t.less(b, a)? {
        t.swap(a, b);
    }
    t.swap(b, c);
    Ok(())
}

fn insertion_sort<T: SortTable>(t: &mut T, lo: usize, hi: usize) -> Result<()> {
    for i in lo + 1..hi {
        let mut j = i;
        while j > lo && t.less(j, j - 1)? {
            t.swap(j, j - 1);
            j -= 1;
        }
    }
    Ok(())
}

fn heapsort<T: SortTable>(t: &mut T, lo: usize, hi: usize) -> Result<()> {
    let n = hi - lo;
    for root in (0..n / 2).rev() {
        sift_down(t, lo, root, n)?;
    }
    for end in (1..n).rev() {
        t.swap(lo, lo + end);
        sift_down(t, lo, 0, end)?;
    }
    Ok(())
}

fn sift_down<T: SortTable>(t: &mut T, lo: usize, mut root: usize, n: usize) -> Result<()> {
    loop {
        let mut child = 2 * root + 1;
        if child >= n {
            break;
        }
        if child + 1 < n && t.less(lo + child, lo + child + 1)? {
            child += 1;
        }
        if !t.less(lo + root, lo + child)? {
            break;
        }
        t.swap(lo + root, lo + child);
        root = child;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use std::io;

    struct VecTable {
        data: Vec<u32>,
        compares: usize,
        fail_after: Option<usize>,
    }

    impl VecTable {
        fn new(data: Vec<u32>) -> Self {
            VecTable {
                data,
                compares: 0,
                fail_after: None,
            }
        }
    }

    impl SortTable for VecTable {
        fn len(&self) -> usize {
            self.data.len()
        }

        fn less(&mut self, i: usize, j: usize) -> Result<bool> {
            self.compares += 1;
            if self.fail_after.is_some_and(|limit| self.compares > limit) {
                return Err(IndexError::Io(io::Error::other("comparator failed")));
            }
            Ok(self.data[i] < self.data[j])
        }

        fn swap(&mut self, i: usize, j: usize) {
            self.data.swap(i, j);
        }
    }

    fn pseudo_random(n: usize, mut seed: u32) -> Vec<u32> {
        (0..n)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                seed >> 8
            })
            .collect()
    }

    #[test]
    fn sorts_like_std_sort() {
        for &n in &[0usize, 1, 2, 3, 12, 13, 64, 100, 1000] {
            let data = pseudo_random(n, 7 + n as u32);
            let mut expect = data.clone();
            expect.sort_unstable();
            let mut table = VecTable::new(data);
            sort(&mut table).unwrap();
            assert_eq!(table.data, expect, "n = {n}");
        }
    }

    #[test]
    fn sorts_adversarial_shapes() {
        let shapes: Vec<Vec<u32>> = vec![
            (0..500).collect(),
            (0..500).rev().collect(),
            vec![7; 300],
            (0..400).map(|i| i % 5).collect(),
        ];
        for data in shapes {
            let mut expect = data.clone();
            expect.sort_unstable();
            let mut table = VecTable::new(data);
            sort(&mut table).unwrap();
            assert_eq!(table.data, expect);
        }
    }

    #[test]
    fn heapsort_sorts_directly() {
        let data = pseudo_random(200, 99);
        let mut expect = data.clone();
        expect.sort_unstable();
        let mut table = VecTable::new(data);
        heapsort(&mut table, 0, 200).unwrap();
        assert_eq!(table.data, expect);
    }

    #[test]
    fn comparator_errors_abort_the_sort() {
        let mut table = VecTable::new(pseudo_random(100, 3));
        table.fail_after = Some(20);
        assert!(sort(&mut table).is_err());
    }
}
