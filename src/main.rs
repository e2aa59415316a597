use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use widx::config::{BuildConfig, SearchConfig};
use widx::index::{Searcher, build_index};
use widx::output;
use widx::utils::progress::format_unit;

#[derive(Parser)]
#[command(name = "widx")]
#[command(about = "Builds an on-disk word index over a directory and answers prefix queries")]
struct Cli {
    /// Build (or rebuild) the index instead of querying it
    #[arg(short = 'm', long = "make")]
    make: bool,

    /// Directory holding the corpus files
    #[arg(short, long, default_value = "./")]
    dir: PathBuf,

    /// Index file path (defaults to DIR/.index)
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Worker threads for the scan passes
    #[arg(short = 'j', long = "workers", default_value_t = 1)]
    workers: usize,

    /// Recurse into subdirectories when scanning the corpus
    #[arg(short, long)]
    recursive: bool,

    /// Accepted for compatibility; matching is always case-sensitive
    #[arg(short = 'c', long = "case-sensitive")]
    case_sensitive: bool,

    /// Accepted for compatibility; matching is always case-sensitive
    #[arg(short = 'C', long = "ignore-case")]
    ignore_case: bool,

    #[arg(short = 't', hide = true)]
    timing: bool,

    /// Word pattern with --make, query prefix otherwise
    arg: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.timing {
        bail!("timing mode is not implemented");
    }

    if cli.make {
        let mut config = BuildConfig::new(cli.dir, cli.arg);
        config.workers = cli.workers.max(1);
        config.recursive = cli.recursive;
        if let Some(index) = cli.index {
            config.index_file = index;
        }

        let report = build_index(&config)
            .with_context(|| format!("indexing {}", config.dir.display()))?;
        println!(
            "indexed {} files ({}B) into {} entries, {}B index",
            report.files,
            format_unit(report.bytes),
            report.entries,
            format_unit(report.index_size),
        );
    } else {
        let mut config = SearchConfig::new(cli.dir, cli.arg);
        if let Some(index) = cli.index {
            config.index_file = index;
        }

        let mut searcher = Searcher::open(&config)
            .with_context(|| format!("opening index {}", config.index_file.display()))?;
        let matches = searcher.search(&config.query)?;
        output::print_matches(&matches, true)?;
    }

    Ok(())
}
