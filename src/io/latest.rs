//! Single-slot "latest sample" cell.
//!
//! The reader thread overwrites the slot with every decoded line; consumers
//! read whatever is there without blocking. A reading may be stale (the
//! reader is slower than the consumer) or repeated (the consumer is faster),
//! which the sequence number exposes.

use std::sync::Arc;

use parking_lot::Mutex;

use super::line_protocol::DeviceLine;

#[derive(Debug, Default)]
struct Slot {
    seq: u64,
    line: Option<DeviceLine>,
}

/// Shared, cloneable handle to the most recent device line.
#[derive(Debug, Clone, Default)]
pub struct LatestSample {
    slot: Arc<Mutex<Slot>>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored line. Returns its sequence number (1-based).
    pub fn publish(&self, line: DeviceLine) -> u64 {
        let mut slot = self.slot.lock();
        slot.seq += 1;
        slot.line = Some(line);
        slot.seq
    }

    /// Most recent line and its sequence number, if any was published.
    pub fn latest(&self) -> Option<(u64, DeviceLine)> {
        let slot = self.slot.lock();
        slot.line.map(|line| (slot.seq, line))
    }

    /// The most recent line only if it is newer than `seq`.
    pub fn newer_than(&self, seq: u64) -> Option<(u64, DeviceLine)> {
        self.latest().filter(|(s, _)| *s > seq)
    }

    /// Number of lines published so far.
    pub fn sequence(&self) -> u64 {
        self.slot.lock().seq
    }
}
