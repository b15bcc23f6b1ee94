//! Buffer manager statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the buffer manager.
///
/// All fields are atomic; `Ordering::Relaxed` is enough because each
/// counter is independent and only read for reporting.
///
/// # Example
/// ```
/// use blockmgr::BufferStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Pins served by a frame already bound to the block.
    pub hits: AtomicU64,

    /// Pins that had to bind a free frame to the block.
    pub misses: AtomicU64,

    /// Bindings dropped to make room for another block.
    pub reassignments: AtomicU64,

    /// Blocks read from the block store.
    pub pages_read: AtomicU64,

    /// Modified frames written to the block store.
    pub pages_written: AtomicU64,

    /// Pin requests that had to wait for a frame.
    pub waits: AtomicU64,

    /// Pin requests that gave up with `Error::BufferAbort`.
    pub aborts: AtomicU64,
}

impl BufferStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of pins served without binding a frame (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Copy the current values for display or comparison.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reassignments: self.reassignments.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.reassignments,
            &self.pages_read,
            &self.pages_written,
            &self.waits,
            &self.aborts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time copy of [`BufferStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub reassignments: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub waits: u64,
    pub aborts: u64,
}

impl StatsSnapshot {
    /// Fraction of pins served without binding a frame (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, reassignments: {}, waits: {}, aborts: {}, hit_rate: {:.2}% }}",
            self.hits,
            self.misses,
            self.reassignments,
            self.waits,
            self.aborts,
            self.hit_rate() * 100.0
        )
    }
}
