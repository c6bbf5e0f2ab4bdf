//! Cooperative cancellation shared by the orchestrator and every worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable, process-wide "stop now" flag.
///
/// The flag only moves from unset to set while a run is in progress. Workers
/// poll it at the head of the pipeline loop, after each read, inside the
/// turn-wait and before each commit. Nothing is interrupted forcibly: a read
/// or write already in flight completes before the flag is acted upon.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag. Only the orchestrator calls this, before a run starts.
    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
