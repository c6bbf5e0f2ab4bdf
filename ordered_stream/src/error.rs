//! Error types for the block pipeline and the compression service.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::service::Mode;
use crate::ticketer::Ticket;

/// A failure raised inside the worker pool.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("An error occurred while reading block {ticket}: {source}")]
    Read {
        ticket: Ticket,
        #[source]
        source: io::Error,
    },

    #[error("An error occurred while writing block {ticket}: {source}")]
    Write {
        ticket: Ticket,
        #[source]
        source: io::Error,
    },

    /// A commit was attempted for a block whose turn has not come.
    #[error("Block {ticket} committed out of turn (expected block {expected})")]
    OutOfTurn { ticket: Ticket, expected: Ticket },

    #[error("Worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Cancellation was requested from outside the pool and no worker failed.
    #[error("Operation was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for failures of the underlying streams (read or write).
    pub fn is_io(&self) -> bool {
        matches!(self, PipelineError::Read { .. } | PipelineError::Write { .. })
    }
}

/// Why a `compress`/`decompress` call ended as `NotFinished`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("File name cannot be empty")]
    EmptyPath,

    #[error("File: {}, is the same file as the destination.", .0.display())]
    SamePath(PathBuf),

    #[error("File: {}, is not a compressed file.", .0.display())]
    NotAnArchive(PathBuf),

    #[error("File: {}, does not exist.", .0.display())]
    MissingSource(PathBuf),

    /// Opening, deleting or finalizing a file failed.
    #[error("An error occurred during {mode}: {}. {source}", path.display())]
    Io {
        mode: Mode,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker failed to read or write a block.
    #[error("An error occurred during {mode}: {}. {source}", path.display())]
    Stream {
        mode: Mode,
        path: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error("A generic failure occurred during {mode}: {}. {source}", path.display())]
    Unclassified {
        mode: Mode,
        path: PathBuf,
        #[source]
        source: PipelineError,
    },
}

impl ServiceError {
    pub(crate) fn io(mode: Mode, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ServiceError::Io {
            mode,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pipeline(mode: Mode, path: impl Into<PathBuf>, source: PipelineError) -> Self {
        let path = path.into();
        if source.is_io() {
            ServiceError::Stream { mode, path, source }
        } else {
            ServiceError::Unclassified { mode, path, source }
        }
    }

    /// Validation failures are detected before any stream is opened and are
    /// reported as warnings rather than errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::EmptyPath
                | ServiceError::SamePath(_)
                | ServiceError::NotAnArchive(_)
                | ServiceError::MissingSource(_)
        )
    }
}
