//! Lock Table - shared/exclusive block locks with age-based conflict resolution.
//!
//! The [`LockTable`] records, per block, the sequence of transactions
//! holding a lock on it and in which mode. Requests that conflict with an
//! older holder abort at once; requests that conflict only with younger
//! holders wait, bounded by the table's [`WaitPolicy`].

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::common::{BlockId, Error, Result, TxnId, WaitPolicy};

/// Lock mode held on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Reader lock; any number of transactions may share it.
    Shared,
    /// Writer lock; excludes every other transaction.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// One holder marker in a block's lock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub mode: LockMode,
    pub txn: TxnId,
}

impl LockEntry {
    /// Shared marker for `txn`.
    pub fn shared(txn: TxnId) -> Self {
        Self {
            mode: LockMode::Shared,
            txn,
        }
    }

    /// Exclusive marker for `txn`.
    pub fn exclusive(txn: TxnId) -> Self {
        Self {
            mode: LockMode::Exclusive,
            txn,
        }
    }
}

/// Outcome of checking a request against the current holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    /// Nothing blocks the request.
    None,
    /// Blocked by a younger holder: wait for it.
    Wait(TxnId),
    /// Blocked by an older holder: the requester must abort.
    Abort(TxnId),
}

type LockMap = HashMap<BlockId, Vec<LockEntry>>;

/// Process-wide registry of block locks.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────┐
/// │                       LockTable                       │
/// │  ┌────────────────────────────────────────────────┐   │
/// │  │ Mutex<HashMap<BlockId, Vec<LockEntry>>>        │   │
/// │  │   blk A → [S(3), S(7)]                         │   │
/// │  │   blk B → [X(5)]                               │   │
/// │  └────────────────────────────────────────────────┘   │
/// │  ┌──────────────┐                                     │
/// │  │ released:    │  one condition for every block,     │
/// │  │   Condvar    │  broadcast on each release          │
/// │  └──────────────┘                                     │
/// └───────────────────────────────────────────────────────┘
/// ```
///
/// # Conflict Rules
/// - Shared: blocked by an exclusive marker of another transaction.
/// - Exclusive: blocked by any marker of another transaction.
///
/// When blocked, the requester compares ages with the blocking holders.
/// If any of them is older, the requester fails with `Error::LockAbort`
/// without waiting. Otherwise it waits and re-checks after every release
/// and every poll interval, failing with `Error::LockAbort` once
/// `max_wait` has elapsed. Every holder is checked, not only the first
/// one found, so a younger requester never waits behind an older holder
/// even when several transactions share the block.
///
/// # Invariants
/// - A block has at most one exclusive marker.
/// - An exclusive marker never coexists with a marker of another transaction.
/// - A block with no markers has no entry in the map.
///
/// # Reentrancy
/// Each `acquire_shared` records one shared marker, so N shared acquires
/// need N releases. `acquire_exclusive` by the current exclusive holder
/// records nothing. A transaction holding the exclusive lock is granted
/// shared requests at once.
///
/// # Example
/// ```
/// use blockmgr::concurrency::LockTable;
/// use blockmgr::{BlockId, TxnId};
///
/// let table = LockTable::new();
/// let blk = BlockId::new("data.tbl", 0);
///
/// table.acquire_shared(&blk, TxnId::new(1)).unwrap();
/// table.acquire_shared(&blk, TxnId::new(2)).unwrap();
///
/// // Txn 3 is younger than both readers: it aborts instead of waiting.
/// assert!(table.acquire_exclusive(&blk, TxnId::new(3)).is_err());
///
/// table.release(&blk, TxnId::new(1));
/// table.release(&blk, TxnId::new(2));
/// assert!(!table.is_locked(&blk));
/// ```
pub struct LockTable {
    policy: WaitPolicy,
    locks: Mutex<LockMap>,
    released: Condvar,
}

impl LockTable {
    /// Create a lock table with the default wait policy (10s deadline).
    pub fn new() -> Self {
        Self::with_policy(WaitPolicy::default())
    }

    /// Create a lock table with a custom wait policy.
    pub fn with_policy(policy: WaitPolicy) -> Self {
        Self {
            policy,
            locks: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    /// The wait policy in effect.
    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    // ========================================================================
    // Public API: Acquire and release
    // ========================================================================

    /// Grant a shared lock on `block` to `txn`.
    ///
    /// Blocks while another transaction holds the exclusive lock.
    ///
    /// # Errors
    /// `Error::LockAbort` if the exclusive holder is older than `txn`, or
    /// if the lock was not granted within `max_wait`. No marker is
    /// recorded on failure.
    pub fn acquire_shared(&self, block: &BlockId, txn: TxnId) -> Result<()> {
        let mut locks = self.locks.lock();
        self.wait_for_grant(&mut locks, block, txn, LockMode::Shared)?;

        locks
            .entry(block.clone())
            .or_default()
            .push(LockEntry::shared(txn));

        trace!(%block, %txn, "granted S lock");
        Ok(())
    }

    /// Grant the exclusive lock on `block` to `txn`.
    ///
    /// Blocks while any other transaction holds a lock of either mode. A
    /// shared lock already held by `txn` itself does not block it, so this
    /// also upgrades S to X.
    ///
    /// # Errors
    /// `Error::LockAbort` if any other holder is older than `txn`, or if the
    /// lock was not granted within `max_wait`. No marker is recorded on
    /// failure.
    pub fn acquire_exclusive(&self, block: &BlockId, txn: TxnId) -> Result<()> {
        let mut locks = self.locks.lock();
        self.wait_for_grant(&mut locks, block, txn, LockMode::Exclusive)?;

        let entries = locks.entry(block.clone()).or_default();
        let marker = LockEntry::exclusive(txn);
        if !entries.contains(&marker) {
            entries.push(marker);
        }

        trace!(%block, %txn, "granted X lock");
        Ok(())
    }

    /// Release `txn`'s lock on `block`.
    ///
    /// Removes one shared marker and the exclusive marker of `txn`, drops
    /// the block's entry once it is empty, and wakes every waiter.
    /// Releasing a lock that is not held is a no-op.
    pub fn release(&self, block: &BlockId, txn: TxnId) {
        let mut locks = self.locks.lock();

        let Some(entries) = locks.get_mut(block) else {
            warn!(%block, %txn, "release of unlocked block ignored");
            return;
        };

        let removed_shared = remove_first(entries, LockEntry::shared(txn));
        let removed_exclusive = remove_first(entries, LockEntry::exclusive(txn));
        if !removed_shared && !removed_exclusive {
            warn!(%block, %txn, "release of lock not held ignored");
            return;
        }

        if entries.is_empty() {
            locks.remove(block);
        }
        drop(locks);

        trace!(%block, %txn, "released lock");
        self.released.notify_all();
    }

    // ========================================================================
    // Public API: Inspection
    // ========================================================================

    /// Snapshot of the markers on `block`, in acquisition order.
    pub fn holders(&self, block: &BlockId) -> Vec<LockEntry> {
        self.locks.lock().get(block).cloned().unwrap_or_default()
    }

    /// True if any transaction holds a lock on `block`.
    pub fn is_locked(&self, block: &BlockId) -> bool {
        self.locks.lock().contains_key(block)
    }

    /// Number of blocks with at least one lock.
    pub fn locked_block_count(&self) -> usize {
        self.locks.lock().len()
    }

    // ========================================================================
    // Internal: Waiting
    // ========================================================================

    /// Wait until `txn` may take `mode` on `block`, or fail.
    ///
    /// Returns with the monitor held, so the caller records its marker
    /// atomically with the final check.
    fn wait_for_grant(
        &self,
        locks: &mut MutexGuard<'_, LockMap>,
        block: &BlockId,
        txn: TxnId,
        mode: LockMode,
    ) -> Result<()> {
        let deadline = self.policy.deadline(Instant::now());

        loop {
            let entries = locks.get(block).map(Vec::as_slice).unwrap_or(&[]);
            let conflict = match mode {
                LockMode::Shared => shared_conflict(entries, txn),
                LockMode::Exclusive => exclusive_conflict(entries, txn),
            };

            match conflict {
                Conflict::None => return Ok(()),
                Conflict::Abort(holder) => {
                    warn!(%block, %txn, %holder, %mode, "lock request aborted by older holder");
                    return Err(lock_abort(block, txn));
                }
                Conflict::Wait(holder) => {
                    let Some(timeout) = self.policy.next_wait(deadline, Instant::now()) else {
                        warn!(%block, %txn, %holder, %mode, "lock wait timed out");
                        return Err(lock_abort(block, txn));
                    };

                    debug!(%block, %txn, %holder, %mode, "waiting for lock");
                    self.released.wait_for(locks, timeout);
                }
            }
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared request conflicts only with another transaction's X marker.
fn shared_conflict(entries: &[LockEntry], txn: TxnId) -> Conflict {
    entries
        .iter()
        .find(|e| e.mode == LockMode::Exclusive && e.txn != txn)
        .map_or(Conflict::None, |e| age_rule(e.txn, txn))
}

/// An exclusive request conflicts with every marker of another transaction.
fn exclusive_conflict(entries: &[LockEntry], txn: TxnId) -> Conflict {
    let mut foreign = entries.iter().filter(|e| e.txn != txn);

    match foreign.clone().find(|e| e.txn.is_older_than(txn)) {
        Some(older) => Conflict::Abort(older.txn),
        None => foreign.next().map_or(Conflict::None, |e| Conflict::Wait(e.txn)),
    }
}

fn age_rule(holder: TxnId, requester: TxnId) -> Conflict {
    if holder.is_older_than(requester) {
        Conflict::Abort(holder)
    } else {
        Conflict::Wait(holder)
    }
}

fn remove_first(entries: &mut Vec<LockEntry>, marker: LockEntry) -> bool {
    match entries.iter().position(|e| *e == marker) {
        Some(pos) => {
            entries.remove(pos);
            true
        }
        None => false,
    }
}

fn lock_abort(block: &BlockId, txn: TxnId) -> Error {
    Error::LockAbort {
        block: block.clone(),
        txn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn blk(n: u64) -> BlockId {
        BlockId::new("test.tbl", n)
    }

    fn tx(n: u64) -> TxnId {
        TxnId::new(n)
    }

    fn no_wait() -> LockTable {
        LockTable::with_policy(WaitPolicy::NO_WAIT)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let table = no_wait();
        table.acquire_shared(&blk(0), tx(1)).unwrap();
        table.acquire_shared(&blk(0), tx(2)).unwrap();

        assert_eq!(
            table.holders(&blk(0)),
            vec![LockEntry::shared(tx(1)), LockEntry::shared(tx(2))]
        );
    }

    #[test]
    fn test_exclusive_on_fresh_block() {
        let table = no_wait();
        table.acquire_exclusive(&blk(0), tx(4)).unwrap();
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::exclusive(tx(4))]);
    }

    #[test]
    fn test_younger_shared_requester_aborts() {
        let table = LockTable::new();
        table.acquire_exclusive(&blk(0), tx(5)).unwrap();

        let start = Instant::now();
        let result = table.acquire_shared(&blk(0), tx(9));
        assert!(matches!(result, Err(Error::LockAbort { txn, .. }) if txn == tx(9)));
        // Default policy would wait 10s; the abort must be immediate.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::exclusive(tx(5))]);
    }

    #[test]
    fn test_older_shared_requester_times_out() {
        let table = LockTable::with_policy(
            WaitPolicy::default()
                .with_max_wait(Duration::from_millis(100))
                .with_poll_interval(Duration::from_millis(20)),
        );
        table.acquire_exclusive(&blk(0), tx(5)).unwrap();

        let start = Instant::now();
        let result = table.acquire_shared(&blk(0), tx(3));
        assert!(matches!(result, Err(Error::LockAbort { .. })));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(table.holders(&blk(0)).len(), 1);
    }

    #[test]
    fn test_exclusive_blocked_by_older_reader_aborts() {
        let table = LockTable::new();
        table.acquire_shared(&blk(0), tx(2)).unwrap();

        assert!(table.acquire_exclusive(&blk(0), tx(6)).is_err());
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::shared(tx(2))]);
    }

    #[test]
    fn test_exclusive_checks_every_holder() {
        // Holders in insertion order: 8 (younger), then 2 (older). A
        // first-match scan would wait on 8; every holder is checked, so
        // txn 5 aborts because of 2.
        let table = LockTable::new();
        table.acquire_shared(&blk(0), tx(8)).unwrap();
        table.acquire_shared(&blk(0), tx(2)).unwrap();

        let start = Instant::now();
        assert!(table.acquire_exclusive(&blk(0), tx(5)).is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_upgrade_sole_reader() {
        let table = no_wait();
        table.acquire_shared(&blk(0), tx(3)).unwrap();
        table.acquire_exclusive(&blk(0), tx(3)).unwrap();

        assert_eq!(
            table.holders(&blk(0)),
            vec![LockEntry::shared(tx(3)), LockEntry::exclusive(tx(3))]
        );

        table.release(&blk(0), tx(3));
        assert!(!table.is_locked(&blk(0)));
    }

    #[test]
    fn test_exclusive_reacquire_records_one_marker() {
        let table = no_wait();
        table.acquire_exclusive(&blk(0), tx(1)).unwrap();
        table.acquire_exclusive(&blk(0), tx(1)).unwrap();
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::exclusive(tx(1))]);
    }

    #[test]
    fn test_exclusive_holder_may_read() {
        let table = no_wait();
        table.acquire_exclusive(&blk(0), tx(7)).unwrap();
        table.acquire_shared(&blk(0), tx(7)).unwrap();
        assert_eq!(table.holders(&blk(0)).len(), 2);
    }

    #[test]
    fn test_shared_acquires_are_counted() {
        let table = no_wait();
        for _ in 0..3 {
            table.acquire_shared(&blk(0), tx(1)).unwrap();
        }

        table.release(&blk(0), tx(1));
        table.release(&blk(0), tx(1));
        assert!(table.is_locked(&blk(0)));

        table.release(&blk(0), tx(1));
        assert!(!table.is_locked(&blk(0)));
        assert_eq!(table.locked_block_count(), 0);
    }

    #[test]
    fn test_unmatched_release_is_noop() {
        let table = no_wait();
        table.release(&blk(0), tx(1));

        table.acquire_shared(&blk(0), tx(1)).unwrap();
        table.release(&blk(0), tx(2));
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::shared(tx(1))]);
    }

    #[test]
    fn test_blocks_are_independent() {
        let table = no_wait();
        table.acquire_exclusive(&blk(0), tx(1)).unwrap();
        table.acquire_exclusive(&blk(1), tx(2)).unwrap();
        assert_eq!(table.locked_block_count(), 2);
    }

    #[test]
    fn test_older_waiter_granted_after_release() {
        let table = Arc::new(LockTable::new());
        table.acquire_exclusive(&blk(0), tx(5)).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || table.acquire_shared(&blk(0), tx(3)))
        };

        thread::sleep(Duration::from_millis(50));
        table.release(&blk(0), tx(5));

        waiter.join().unwrap().unwrap();
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::shared(tx(3))]);
    }

    #[test]
    fn test_unbounded_max_wait_still_grants() {
        let table = Arc::new(LockTable::with_policy(
            WaitPolicy::default()
                .with_max_wait(Duration::MAX)
                .with_poll_interval(Duration::from_millis(20)),
        ));
        table.acquire_exclusive(&blk(0), tx(5)).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || table.acquire_exclusive(&blk(0), tx(2)))
        };

        thread::sleep(Duration::from_millis(50));
        table.release(&blk(0), tx(5));

        waiter.join().unwrap().unwrap();
        assert_eq!(table.holders(&blk(0)), vec![LockEntry::exclusive(tx(2))]);
    }

    #[test]
    fn test_conflict_helpers() {
        let entries = [LockEntry::shared(tx(4)), LockEntry::exclusive(tx(4))];
        assert_eq!(shared_conflict(&entries, tx(4)), Conflict::None);
        assert_eq!(shared_conflict(&entries, tx(2)), Conflict::Wait(tx(4)));
        assert_eq!(shared_conflict(&entries, tx(6)), Conflict::Abort(tx(4)));

        assert_eq!(exclusive_conflict(&entries, tx(4)), Conflict::None);
        assert_eq!(exclusive_conflict(&entries, tx(1)), Conflict::Wait(tx(4)));
        assert_eq!(exclusive_conflict(&[], tx(1)), Conflict::None);
    }
}
