//! Indexing and query benchmarks over a synthetic corpus.
//!
//! Run with: `cargo bench`
//! Save baseline: `cargo bench -- --save-baseline main`
//! Compare: `cargo bench -- --baseline main`

use std::fmt::Write as _;
use std::fs;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

use widx::{BuildConfig, SearchConfig, Searcher, build_index};

/// Lays out `files` files of `lines` lines each, one pseudo-random
/// word per line followed by filler.
fn synthetic_corpus(files: usize, lines: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    for f in 0..files {
        let mut content = String::new();
        for _ in 0..lines {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            writeln!(content, "word{:05} trailing filler text", state % 10_000).unwrap();
        }
        fs::write(dir.path().join(format!("file{f:03}.txt")), content).unwrap();
    }
    dir
}

fn bench_build(c: &mut Criterion) {
    let dir = synthetic_corpus(16, 2_000);

    let mut group = c.benchmark_group("indexing");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for workers in [1usize, 4] {
        group.bench_function(BenchmarkId::new("build_32k_words", workers), |b| {
            b.iter(|| {
                let mut config = BuildConfig::new(dir.path(), r"(\w+)");
                config.workers = workers;
                build_index(&config).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dir = synthetic_corpus(16, 2_000);
    build_index(&BuildConfig::new(dir.path(), r"(\w+)")).unwrap();
    let mut searcher = Searcher::open(&SearchConfig::new(dir.path(), "word00")).unwrap();

    c.bench_function("search_prefix_32k_entries", |b| {
        b.iter(|| searcher.search("word00").unwrap())
    });
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
