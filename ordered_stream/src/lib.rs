//! Ordered, cancellable block pipeline for whole-file compression.
//!
//! A fixed pool of workers races to pull fixed-size blocks from one source
//! stream and commits them to one destination stream in their original order.
//! A codec is attached by wrapping either stream, so the same pipeline both
//! compresses and decompresses.
//!
//! # Modules
//!
//! - [`ticketer`]: read/write cursors and the turn-wait
//! - [`pipeline`]: the worker pool and its loop
//! - [`codec`]: gzip, bzip2 and zstd stream adapters
//! - [`service`]: file-level `compress`/`decompress` with validation
//!
//! # Example
//!
//! ```no_run
//! use ordered_stream::{CompressionService, ServiceConfig};
//!
//! let mut service = CompressionService::new(ServiceConfig::default().with_workers(4));
//! let result = service.compress("data.bin", "data.bin.gz");
//! assert!(result.is_finished());
//! ```

pub mod cancel;
pub mod codec;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod service;
pub mod ticketer;

pub use cancel::CancellationToken;
pub use codec::{Codec, DecodedReader, EncodedWriter};
pub use error::{PipelineError, ServiceError};
pub use pipeline::{
    Pipeline, PipelineOutput, PipelineStats, ProgressFn, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE,
};
pub use service::{CompressionResult, CompressionService, Mode, ServiceConfig};
pub use ticketer::{BlockTicketer, Ticket};
