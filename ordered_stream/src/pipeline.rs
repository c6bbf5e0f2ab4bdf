//! Worker pool that moves blocks from a source stream to a destination stream
//! while preserving their original order.
//!
//! # Architecture
//!
//! Every worker runs the same loop against a shared [`BlockTicketer`]:
//!
//! 1. **Read**: take the read lock, pull one block, receive its ticket
//! 2. **Turn-wait**: sleep until the write cursor reaches the ticket
//! 3. **Commit**: take the write lock, write the block, advance the cursor
//!
//! Reads and writes are each serialized by one lock, so the pool overlaps one
//! worker's read with another worker's wait or commit; it does not transform
//! blocks in parallel. Any codec work happens inside the wrapped streams.
//!
//! The first failure in any worker cancels the run. Every other worker
//! observes the flag at its next checkpoint and returns, so the pool always
//! joins.

use std::any::Any;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use log::{debug, trace};
use rayon::ThreadPoolBuilder;

use crate::cancel::CancellationToken;
use crate::error::PipelineError;
use crate::ticketer::{BlockTicketer, Commit, ReadTicket, Turn};

pub use crate::ticketer::PipelineStats;

/// Default block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Largest accepted block size: 1 GiB. Larger requests are clamped.
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024 * 1024;

/// Callback invoked with the length of each committed block.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// What a successful run hands back.
pub struct PipelineOutput<W> {
    /// The destination stream, for the caller to finish or flush.
    pub writer: W,
    pub stats: PipelineStats,
}

/// A fixed-size pool of identical pipeline workers.
#[derive(Clone)]
pub struct Pipeline {
    workers: usize,
    block_size: usize,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            workers: default_workers(),
            block_size: DEFAULT_BLOCK_SIZE,
            cancel,
            progress: None,
        }
    }

    /// Sets the pool size. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the maximum block length, clamped to `1..=MAX_BLOCK_SIZE`.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.clamp(1, MAX_BLOCK_SIZE);
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    /// Copies `reader` into `writer` block by block using the whole pool.
    ///
    /// Returns the first worker failure if any worker failed, or
    /// [`PipelineError::Cancelled`] if the token was cancelled from outside.
    /// On failure the destination may already hold a prefix of the output.
    pub fn run<R, W>(&self, reader: R, writer: W) -> Result<PipelineOutput<W>, PipelineError>
    where
        R: Read + Send,
        W: Write + Send,
    {
        let ticketer = BlockTicketer::new(reader, writer, self.block_size, self.cancel.clone());

        // Dedicated pool: every job blocks on the turn-wait, so sharing the
        // global pool could starve unrelated rayon work
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("blockzip-worker-{i}"))
            .build()?;

        let (error_tx, error_rx) = unbounded::<PipelineError>();
        let progress = self.progress.as_deref();

        debug!(
            "Starting {} workers with {} byte blocks",
            self.workers, self.block_size
        );

        // === WORKER POOL ===
        //
        // One job per thread; the scope is the join barrier.
        pool.scope(|s| {
            for worker in 0..self.workers {
                let ticketer = &ticketer;
                let error_tx = error_tx.clone();

                s.spawn(move |_| {
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| run_worker(worker, ticketer, progress)));

                    let error = match outcome {
                        Ok(Ok(())) => return,
                        Ok(Err(error)) => error,
                        Err(payload) => PipelineError::WorkerPanicked {
                            worker,
                            message: panic_message(payload.as_ref()),
                        },
                    };

                    // Wake siblings parked in the turn-wait before reporting
                    ticketer.cancel();
                    let _ = error_tx.send(error);
                });
            }
        });
        drop(error_tx);

        let mut errors = error_rx.into_iter();
        if let Some(first) = errors.next() {
            for other in errors {
                debug!("Additional worker failure after cancellation: {}", other);
            }
            return Err(first);
        }

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let (writer, stats) = ticketer.into_parts();
        debug_assert_eq!(stats.blocks_read, stats.blocks_written);
        debug!(
            "Pipeline finished: {} blocks, {} bytes",
            stats.blocks_written, stats.bytes_written
        );

        Ok(PipelineOutput { writer, stats })
    }
}

/// The pipeline loop of a single worker.
fn run_worker<R: Read, W: Write>(
    worker: usize,
    ticketer: &BlockTicketer<R, W>,
    progress: Option<&(dyn Fn(u64) + Send + Sync)>,
) -> Result<(), PipelineError> {
    trace!("Worker {} started", worker);

    while !ticketer.is_cancelled() {
        let (ticket, block) = match ticketer.next_read_ticket()? {
            ReadTicket::Block(ticket, block) => (ticket, block),
            ReadTicket::EndOfInput | ReadTicket::Cancelled => break,
        };

        if ticketer.wait_for_turn(ticket) == Turn::Cancelled {
            break;
        }

        match ticketer.try_commit(ticket, &block)? {
            Commit::Written(_) => {
                if let Some(progress) = progress {
                    progress(block.len() as u64);
                }
            }
            Commit::Cancelled => break,
        }
    }

    trace!("Worker {} stopped", worker);
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
