//! File-level compression service built on the block pipeline.
//!
//! A call moves through `Validating → Running → {Finished | NotFinished}`.
//! Validation failures never touch the filesystem beyond an existence check
//! and are logged as warnings. Anything that goes wrong once files are being
//! opened cancels the run, is logged as an error, and still ends in
//! [`CompressionResult::NotFinished`]. No error crosses the public boundary.
//!
//! A failed run can leave a partial destination file behind; it is not
//! cleaned up.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::{error, info, warn};

use crate::cancel::CancellationToken;
use crate::codec::{Codec, DecodedReader, EncodedWriter};
use crate::error::{PipelineError, ServiceError};
use crate::naming;
use crate::pipeline::{
    default_workers, Pipeline, PipelineStats, ProgressFn, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE,
};

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Compress => f.write_str("compress"),
            Mode::Decompress => f.write_str("decompress"),
        }
    }
}

/// Outcome of a `compress` or `decompress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionResult {
    Finished = 0,
    NotFinished = 1,
}

impl CompressionResult {
    pub fn is_finished(self) -> bool {
        self == CompressionResult::Finished
    }

    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        self as u8
    }
}

/// Tunables for a [`CompressionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Pool size; defaults to the number of available cores.
    pub workers: usize,
    /// Maximum block length in bytes, at most [`MAX_BLOCK_SIZE`].
    pub block_size: usize,
    pub codec: Codec,
    /// Codec level; `None` uses the codec's default.
    pub level: Option<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            block_size: DEFAULT_BLOCK_SIZE,
            codec: Codec::default(),
            level: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.clamp(1, MAX_BLOCK_SIZE);
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: Option<u32>) -> Self {
        self.level = level;
        self
    }
}

/// Compresses or decompresses one file at a time through the worker pool.
///
/// Calls take `&mut self`: state is reset per call and a second call cannot
/// start while one is running. Other threads can still stop a run through
/// [`cancellation_token`](CompressionService::cancellation_token).
pub struct CompressionService {
    config: ServiceConfig,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
    last_stats: Option<PipelineStats>,
}

impl Default for CompressionService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl CompressionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            progress: None,
            last_stats: None,
        }
    }

    /// Registers a callback that receives the length of every committed block.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle for cancelling the current run from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cursor values of the most recent `Finished` run.
    pub fn last_stats(&self) -> Option<PipelineStats> {
        self.last_stats
    }

    /// Compresses `source` into `destination`, appending the codec's suffix to
    /// the destination unless it already ends in a recognized archive suffix.
    pub fn compress(
        &mut self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> CompressionResult {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let outcome = require_names(source, destination).and_then(|()| {
            let destination = naming::with_archive_suffix(destination, self.config.codec);
            self.run(Mode::Compress, source, &destination)
        });
        self.conclude(Mode::Compress, source, outcome)
    }

    /// Decompresses `source`, which must carry a recognized archive suffix,
    /// into `destination`.
    pub fn decompress(
        &mut self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> CompressionResult {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let outcome = require_names(source, destination).and_then(|()| {
            if !naming::is_archive(source) {
                return Err(ServiceError::NotAnArchive(source.to_path_buf()));
            }
            self.run(Mode::Decompress, source, destination)
        });
        self.conclude(Mode::Decompress, source, outcome)
    }

    fn run(
        &mut self,
        mode: Mode,
        source: &Path,
        destination: &Path,
    ) -> Result<PipelineStats, ServiceError> {
        if !source.is_file() {
            return Err(ServiceError::MissingSource(source.to_path_buf()));
        }
        if same_file(source, destination) {
            return Err(ServiceError::SamePath(source.to_path_buf()));
        }

        // === RUNNING ===
        self.cancel.reset();
        remove_if_exists(destination).map_err(|e| ServiceError::io(mode, destination, e))?;

        let input = File::open(source).map_err(|e| ServiceError::io(mode, source, e))?;
        let output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .map_err(|e| ServiceError::io(mode, destination, e))?;

        let pipeline = Pipeline::new(self.cancel.clone())
            .with_workers(self.config.workers)
            .with_block_size(self.config.block_size)
            .with_progress(self.progress.clone());

        // Read failures belong to the source, write failures to the destination
        let pipeline_error = |e: PipelineError| {
            let path = match e {
                PipelineError::Write { .. } => destination,
                _ => source,
            };
            ServiceError::pipeline(mode, path, e)
        };

        let codec = self.config.codec;
        let stats = match mode {
            Mode::Compress => {
                let encoder = EncodedWriter::new(codec, output, self.config.level)
                    .map_err(|e| ServiceError::io(mode, destination, e))?;
                let done = pipeline.run(input, encoder).map_err(pipeline_error)?;
                done.writer
                    .finish()
                    .map_err(|e| ServiceError::io(mode, destination, e))?;
                done.stats
            }
            Mode::Decompress => {
                let decoder =
                    DecodedReader::new(codec, input).map_err(|e| ServiceError::io(mode, source, e))?;
                let mut done = pipeline.run(decoder, output).map_err(pipeline_error)?;
                done.writer
                    .flush()
                    .map_err(|e| ServiceError::io(mode, destination, e))?;
                done.stats
            }
        };

        info!(
            "Finished {} ({}): {} -> {} ({} blocks, {} bytes)",
            mode,
            codec,
            source.display(),
            destination.display(),
            stats.blocks_written,
            stats.bytes_written
        );
        Ok(stats)
    }

    /// Reduces a run to its two-valued result, logging any failure.
    fn conclude(
        &mut self,
        mode: Mode,
        source: &Path,
        outcome: Result<PipelineStats, ServiceError>,
    ) -> CompressionResult {
        self.last_stats = None;
        match outcome {
            Ok(stats) if !self.cancel.is_cancelled() => {
                self.last_stats = Some(stats);
                CompressionResult::Finished
            }
            // Cancelled after the pool joined, e.g. while the codec was finishing
            Ok(_) => {
                error!("{}", ServiceError::pipeline(mode, source, PipelineError::Cancelled));
                CompressionResult::NotFinished
            }
            Err(error) if error.is_validation() => {
                warn!("{}", error);
                CompressionResult::NotFinished
            }
            Err(error) => {
                self.cancel.cancel();
                error!("{}", error);
                CompressionResult::NotFinished
            }
        }
    }
}

fn require_names(source: &Path, destination: &Path) -> Result<(), ServiceError> {
    if source.as_os_str().is_empty() || destination.as_os_str().is_empty() {
        return Err(ServiceError::EmptyPath);
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
