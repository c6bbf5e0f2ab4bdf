//! Ticket dispenser that keeps concurrently read blocks in source order.
//!
//! # Algorithm
//!
//! Two cursors, each behind its own lock:
//!
//! - The **read cursor** lives with the source stream. A worker takes the read
//!   lock, pulls one block, and receives the cursor value as the block's ticket.
//!   Tickets are therefore dense and strictly increasing.
//! - The **write cursor** lives with the destination stream. A worker holding
//!   ticket `t` waits on a condition variable until the cursor equals `t`, then
//!   writes its block and advances the cursor, waking every waiter.
//!
//! The locks are independent: a worker writing block K never blocks another
//! worker reading block K+7, and no worker holds one lock while waiting for the
//! other.

use std::io::{Read, Write};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::PipelineError;

/// Position of a block in the source stream, 0-based.
pub type Ticket = u64;

/// Upper bound on how long a turn-waiter sleeps before re-checking the
/// cancellation flag. Commits and pool-internal cancellation wake waiters
/// immediately; this only bounds the latency of an external cancel.
const TURN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Largest buffer reserved before a read. Bigger blocks grow with the data
/// actually read, so a short source never pays for the full block size.
const MAX_PREALLOC: usize = 1024 * 1024;

/// Result of asking for the next block.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadTicket {
    /// A non-empty block and the ticket it must be committed under.
    Block(Ticket, Vec<u8>),
    /// The source is exhausted.
    EndOfInput,
    /// The run was cancelled before the read.
    Cancelled,
}

/// Result of a turn-wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Ready,
    Cancelled,
}

/// Result of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The block was written; carries the new write cursor.
    Written(Ticket),
    Cancelled,
}

/// Final cursor values of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Read cursor: number of non-empty blocks pulled from the source.
    pub blocks_read: u64,
    /// Write cursor: number of blocks committed to the destination.
    pub blocks_written: u64,
    pub bytes_written: u64,
}

struct ReadSide<R> {
    reader: R,
    next: Ticket,
}

struct WriteSide<W> {
    writer: W,
    next: Ticket,
    bytes: u64,
}

/// Shared state of one pipeline run: both streams, both cursors and the
/// cancellation flag.
pub struct BlockTicketer<R, W> {
    read: Mutex<ReadSide<R>>,
    write: Mutex<WriteSide<W>>,
    turn: Condvar,
    block_size: usize,
    cancel: CancellationToken,
}

impl<R: Read, W: Write> BlockTicketer<R, W> {
    /// Creates a ticketer with both cursors at zero.
    pub fn new(reader: R, writer: W, block_size: usize, cancel: CancellationToken) -> Self {
        Self {
            read: Mutex::new(ReadSide { reader, next: 0 }),
            write: Mutex::new(WriteSide {
                writer,
                next: 0,
                bytes: 0,
            }),
            turn: Condvar::new(),
            block_size: block_size.max(1),
            cancel,
        }
    }

    /// Reads the next block under the read lock.
    ///
    /// The block is filled until it holds `block_size` bytes or the source is
    /// exhausted, then trimmed to what was actually read. The read cursor only
    /// advances for non-empty blocks.
    pub fn next_read_ticket(&self) -> Result<ReadTicket, PipelineError> {
        let mut side = lock(&self.read);
        if self.cancel.is_cancelled() {
            return Ok(ReadTicket::Cancelled);
        }

        let ticket = side.next;
        let mut block = Vec::with_capacity(self.block_size.min(MAX_PREALLOC));
        // read_to_end retries on Interrupted and stops at the take limit
        side.reader
            .by_ref()
            .take(self.block_size as u64)
            .read_to_end(&mut block)
            .map_err(|source| PipelineError::Read { ticket, source })?;

        if block.is_empty() {
            return Ok(ReadTicket::EndOfInput);
        }

        side.next += 1;
        Ok(ReadTicket::Block(ticket, block))
    }

    /// Blocks until the write cursor reaches `ticket` or the run is cancelled.
    pub fn wait_for_turn(&self, ticket: Ticket) -> Turn {
        let mut side = lock(&self.write);
        loop {
            if self.cancel.is_cancelled() {
                return Turn::Cancelled;
            }
            if side.next == ticket {
                return Turn::Ready;
            }
            side = match self.turn.wait_timeout(side, TURN_POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Writes `block` under the write lock and advances the write cursor.
    pub fn try_commit(&self, ticket: Ticket, block: &[u8]) -> Result<Commit, PipelineError> {
        let mut side = lock(&self.write);
        if self.cancel.is_cancelled() {
            return Ok(Commit::Cancelled);
        }
        if side.next != ticket {
            return Err(PipelineError::OutOfTurn {
                ticket,
                expected: side.next,
            });
        }

        side.writer
            .write_all(block)
            .map_err(|source| PipelineError::Write { ticket, source })?;
        side.next += 1;
        side.bytes += block.len() as u64;
        let next = side.next;
        drop(side);

        self.turn.notify_all();
        Ok(Commit::Written(next))
    }

    /// Sets the cancellation flag and wakes every turn-waiter.
    pub fn cancel(&self) {
        self.cancel.cancel();
        // Taking the lock orders the notify after any waiter's flag check
        let _side = lock(&self.write);
        self.turn.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Consumes the ticketer, returning the destination stream and the final
    /// cursor values.
    pub fn into_parts(self) -> (W, PipelineStats) {
        let read = self.read.into_inner().unwrap_or_else(PoisonError::into_inner);
        let write = self.write.into_inner().unwrap_or_else(PoisonError::into_inner);
        let stats = PipelineStats {
            blocks_read: read.next,
            blocks_written: write.next,
            bytes_written: write.bytes,
        };
        (write.writer, stats)
    }
}

// A worker that panics while holding a lock cancels the run anyway, so the
// guarded state is still safe to inspect.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn ticketer(data: &[u8], block_size: usize) -> BlockTicketer<Cursor<Vec<u8>>, Vec<u8>> {
        BlockTicketer::new(
            Cursor::new(data.to_vec()),
            Vec::new(),
            block_size,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_tickets_are_dense_and_trimmed() {
        let t = ticketer(b"abcdefghij", 4);

        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(0, b"abcd".to_vec()));
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(1, b"efgh".to_vec()));
        // Final short block is trimmed to the bytes actually read
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(2, b"ij".to_vec()));
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::EndOfInput);
        // End of input does not consume a ticket
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::EndOfInput);

        let (_, stats) = t.into_parts();
        assert_eq!(stats.blocks_read, 3);
        assert_eq!(stats.blocks_written, 0);
    }

    #[test]
    fn test_huge_block_size_reserves_only_what_is_read() {
        // Reserving the whole block up front would abort on allocation
        let t = ticketer(b"hello", 1 << 44);
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(0, b"hello".to_vec()));
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::EndOfInput);
    }

    #[test]
    fn test_zero_bytes_are_kept() {
        // Block content equal to zero must survive untouched
        let data = [0u8, 1, 0, 0, 2, 0];
        let t = ticketer(&data, 8);
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(0, data.to_vec()));
    }

    #[test]
    fn test_short_reads_fill_the_block() {
        // Reader that hands out one byte per call
        struct Trickle(Cursor<Vec<u8>>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = buf.len().min(1);
                self.0.read(&mut buf[..n])
            }
        }

        let t = BlockTicketer::new(
            Trickle(Cursor::new(b"hello world".to_vec())),
            Vec::new(),
            8,
            CancellationToken::new(),
        );
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(0, b"hello wo".to_vec()));
        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Block(1, b"rld".to_vec()));
    }

    #[test]
    fn test_commit_advances_write_cursor() {
        let t = ticketer(b"", 4);
        assert_eq!(t.try_commit(0, b"ab").unwrap(), Commit::Written(1));
        assert_eq!(t.try_commit(1, b"cd").unwrap(), Commit::Written(2));

        let (out, stats) = t.into_parts();
        assert_eq!(out, b"abcd");
        assert_eq!(stats.blocks_written, 2);
        assert_eq!(stats.bytes_written, 4);
    }

    #[test]
    fn test_commit_out_of_turn_is_rejected() {
        let t = ticketer(b"", 4);
        let err = t.try_commit(1, b"late").unwrap_err();
        assert!(matches!(err, PipelineError::OutOfTurn { ticket: 1, expected: 0 }));

        let (out, stats) = t.into_parts();
        assert!(out.is_empty());
        assert_eq!(stats, PipelineStats::default());
    }

    #[test]
    fn test_cancel_short_circuits_read_and_commit() {
        let t = ticketer(b"abcdefgh", 4);
        t.cancel();

        assert_eq!(t.next_read_ticket().unwrap(), ReadTicket::Cancelled);
        assert_eq!(t.try_commit(0, b"abcd").unwrap(), Commit::Cancelled);
        assert_eq!(t.wait_for_turn(0), Turn::Cancelled);
        assert_eq!(t.into_parts().1, PipelineStats::default());
    }

    #[test]
    fn test_read_error_carries_ticket() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "bad sector"))
            }
        }

        let t = BlockTicketer::new(Broken, Vec::new(), 4, CancellationToken::new());
        let err = t.next_read_ticket().unwrap_err();
        assert!(matches!(err, PipelineError::Read { ticket: 0, .. }));
    }

    #[test]
    fn test_waiter_wakes_on_commit() {
        let t = Arc::new(ticketer(b"", 4));

        let waiter = {
            let t = Arc::clone(&t);
            thread::spawn(move || t.wait_for_turn(1))
        };

        thread::sleep(Duration::from_millis(20));
        t.try_commit(0, b"x").unwrap();
        assert_eq!(waiter.join().unwrap(), Turn::Ready);
    }

    #[test]
    fn test_waiter_wakes_on_cancel() {
        let t = Arc::new(ticketer(b"", 4));

        let waiter = {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                let start = Instant::now();
                (t.wait_for_turn(5), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        t.cancel();
        let (turn, waited) = waiter.join().unwrap();
        assert_eq!(turn, Turn::Cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_waiter_observes_external_cancel() {
        // Cancelling through a token clone does not notify the condvar; the
        // poll interval still bounds the wait
        let token = CancellationToken::new();
        let t = Arc::new(BlockTicketer::new(
            Cursor::new(Vec::new()),
            Vec::new(),
            4,
            token.clone(),
        ));

        let waiter = {
            let t = Arc::clone(&t);
            thread::spawn(move || t.wait_for_turn(3))
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Turn::Cancelled);
    }
}
