//! blockzip - Multi-threaded single-file compressor.
//!
//! Compresses or decompresses one file by streaming it through a pool of
//! workers that read fixed-size blocks concurrently and commit them to the
//! output strictly in their original order.
//!
//! # Architecture
//!
//! 1. **Validation**: names, archive suffix, source existence
//! 2. **Worker pool**: read a ticketed block, wait for its turn, write it
//! 3. **Codec**: wraps the destination (compress) or the source (decompress)
//!
//! # Usage
//!
//! ```bash
//! # Compress to data.bin.gz
//! blockzip compress data.bin data.bin
//!
//! # Decompress with 4 workers
//! blockzip decompress data.bin.gz data.bin -j 4
//!
//! # Use zstd at level 10
//! blockzip compress data.bin data.bin --codec zstd -l 10
//! ```
//!
//! Exit status is 0 when the run finished and 1 otherwise.

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use ordered_stream::{
    Codec, CompressionResult, CompressionService, ServiceConfig, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE,
};
use std::path::PathBuf;
use std::process::ExitCode;

mod progress;
use progress::{progress_bar, progress_callback};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Compress,
    Decompress,
}

/// Command-line arguments for blockzip.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Operation to perform
    #[arg(value_enum)]
    mode: Command,

    /// File to read
    source: PathBuf,

    /// File to write. On compress the codec suffix is appended unless the
    /// name already ends in a recognized archive suffix
    destination: PathBuf,

    /// Number of worker threads (default = number of logical cores)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Block size in bytes (1 to 1 GiB)
    #[arg(
        long,
        default_value_t = DEFAULT_BLOCK_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_BLOCK_SIZE as u64)
    )]
    block_size: usize,

    /// Codec applied to the whole stream: gzip, bzip2 or zstd
    #[arg(long, default_value_t = Codec::Gzip)]
    codec: Codec,

    /// Compression level (default depends on the codec; clamped to its range)
    #[arg(short, long)]
    level: Option<u32>,

    /// Only report warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Report per-run diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // RUST_LOG takes precedence over the -q/-v defaults
    let default_level = if args.quiet {
        LevelFilter::Warn
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut config = ServiceConfig::default()
        .with_block_size(args.block_size)
        .with_codec(args.codec)
        .with_level(args.level);
    if let Some(jobs) = args.jobs {
        config = config.with_workers(jobs);
    }

    // Known total only when reading the raw file
    let total = match args.mode {
        Command::Compress => std::fs::metadata(&args.source).ok().map(|m| m.len()),
        Command::Decompress => None,
    };
    let pb = progress_bar(total, !(args.quiet || args.no_progress))?;

    let mut service = CompressionService::new(config).with_progress(progress_callback(&pb));

    // Ctrl-C unwinds the workers cooperatively instead of killing the process
    let token = service.cancellation_token();
    ctrlc::set_handler(move || token.cancel()).context("Failed to install Ctrl-C handler")?;

    let result = match args.mode {
        Command::Compress => service.compress(&args.source, &args.destination),
        Command::Decompress => service.decompress(&args.source, &args.destination),
    };

    match result {
        CompressionResult::Finished => pb.finish_and_clear(),
        CompressionResult::NotFinished => pb.abandon(),
    }

    Ok(ExitCode::from(result.exit_code()))
}
