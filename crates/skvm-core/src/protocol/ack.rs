//! Sequence numbering and acknowledgment matching for outgoing frames.
//!
//! CH9329 frames carry no sequence field on the wire, and the chip answers
//! commands strictly in the order it received them.  Matching is therefore
//! positional: every sent frame is numbered by an atomic counter and pushed
//! onto a FIFO of pending commands; an incoming response resolves the oldest
//! pending entry with the same base command code.  The sequence numbers
//! never leave the process - they exist for logging and latency diagnostics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::frame::{CommandCode, DeviceStatus, FrameKind, SerialCommand};

/// A thread-safe, monotonically increasing counter for frame sequence numbers.
///
/// Numbers start at 0 and wrap at `u64::MAX` without panicking.
///
/// # Examples
///
/// ```rust
/// use skvm_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence number and increments the counter.
    ///
    /// `Relaxed` ordering suffices: the numbers order frames, they do not
    /// synchronize memory between threads.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current value without incrementing.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Outcome of matching a chip response against the pending-command FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The response acknowledged the pending frame with this sequence number.
    Acknowledged { sequence: u64 },
    /// The chip rejected the pending frame with this status.
    Rejected {
        sequence: u64,
        status: DeviceStatus,
    },
    /// No pending command matches this response; ignore it.
    Unsolicited,
}

/// FIFO tracker matching CH9329 responses to previously sent commands.
#[derive(Debug, Default)]
pub struct AckTracker {
    pending: VecDeque<(u64, CommandCode)>,
    counter: SequenceCounter,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outgoing command and returns its sequence number.
    pub fn record(&mut self, code: CommandCode) -> u64 {
        let sequence = self.counter.next();
        self.pending.push_back((sequence, code));
        sequence
    }

    /// Matches an incoming chip frame against the oldest pending command
    /// with the same base code.
    ///
    /// Any older pending entries for *other* codes are left untouched; the
    /// chip only answers commands that request a response, so reports sent
    /// in between may legitimately never be acknowledged.  Host-to-chip
    /// command frames and unmatched responses yield
    /// [`AckOutcome::Unsolicited`].
    pub fn resolve(&mut self, frame: &SerialCommand) -> AckOutcome {
        if frame.kind == FrameKind::Command {
            return AckOutcome::Unsolicited;
        }
        let Some(pos) = self.pending.iter().position(|&(_, code)| code == frame.code) else {
            return AckOutcome::Unsolicited;
        };
        let (sequence, _) = self.pending.remove(pos).expect("position is in range");
        match frame.kind {
            FrameKind::Response => AckOutcome::Acknowledged { sequence },
            FrameKind::ErrorResponse => AckOutcome::Rejected {
                sequence,
                status: frame
                    .payload
                    .first()
                    .copied()
                    .map(DeviceStatus::from)
                    .unwrap_or(DeviceStatus::OperationFailed),
            },
            FrameKind::Command => unreachable!("filtered above"),
        }
    }

    /// Number of commands awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops all pending entries, e.g. after a transport teardown.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
