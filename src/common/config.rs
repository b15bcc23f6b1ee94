//! Configuration constants and wait policy.

use std::time::{Duration, Instant};

/// Size of a disk block (and of a buffer frame's page) in bytes.
///
/// Block `n` of a file lives at offset `n × PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Hard upper bound on how long a lock or pin request may wait.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// How often a waiting request wakes up on its own to re-check its condition.
///
/// Waiters are also woken by every release/unpin; the timer only bounds
/// staleness when a broadcast is missed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Bounded-wait policy shared by the lock table and the buffer manager.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use blockmgr::WaitPolicy;
///
/// let policy = WaitPolicy::default().with_max_wait(Duration::from_millis(200));
/// assert_eq!(policy.max_wait, Duration::from_millis(200));
/// assert_eq!(policy.poll_interval, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time a request may spend waiting before it aborts.
    ///
    /// `Duration::ZERO` means a request that would block aborts at once.
    pub max_wait: Duration,

    /// Interval between self-initiated re-checks while waiting.
    pub poll_interval: Duration,
}

impl WaitPolicy {
    /// Policy that never blocks: conflicting requests abort immediately.
    pub const NO_WAIT: WaitPolicy = WaitPolicy {
        max_wait: Duration::ZERO,
        poll_interval: DEFAULT_POLL_INTERVAL,
    };

    /// Replace the hard deadline.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Replace the poll interval. A zero interval is bumped to 1ms.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Point at which a wait that starts at `start` gives up.
    ///
    /// `None` when `max_wait` is too large to represent: the wait is then
    /// unbounded.
    pub(crate) fn deadline(&self, start: Instant) -> Option<Instant> {
        start.checked_add(self.max_wait)
    }

    /// How long the next wait may last, or `None` once `deadline` has passed.
    pub(crate) fn next_wait(&self, deadline: Option<Instant>, now: Instant) -> Option<Duration> {
        match deadline {
            None => Some(self.poll_interval),
            Some(deadline) if now >= deadline => None,
            Some(deadline) => Some(self.poll_interval.min(deadline - now)),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
