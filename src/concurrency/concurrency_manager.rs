//! Per-transaction lock bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::common::{BlockId, Result, TxnId};
use crate::concurrency::{LockMode, LockTable};

/// Tracks the locks one transaction holds and releases them together.
///
/// Every successful acquire is matched by exactly one `LockTable::release`,
/// either through [`release_all`](Self::release_all) at commit/rollback or
/// when the manager is dropped, including on abort paths.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use blockmgr::concurrency::{ConcurrencyManager, LockMode, LockTable};
/// use blockmgr::{BlockId, TxnId};
///
/// let table = Arc::new(LockTable::new());
/// let blk = BlockId::new("data.tbl", 2);
///
/// {
///     let mut cm = ConcurrencyManager::new(TxnId::new(1), Arc::clone(&table));
///     cm.xlock(&blk).unwrap();
///     assert_eq!(cm.lock_mode(&blk), Some(LockMode::Exclusive));
/// }
/// assert!(!table.is_locked(&blk));
/// ```
pub struct ConcurrencyManager {
    txn: TxnId,
    lock_table: Arc<LockTable>,
    locks: HashMap<BlockId, LockMode>,
}

impl ConcurrencyManager {
    /// Create a manager for `txn` over a shared lock table.
    pub fn new(txn: TxnId, lock_table: Arc<LockTable>) -> Self {
        Self {
            txn,
            lock_table,
            locks: HashMap::new(),
        }
    }

    /// The transaction this manager acts for.
    pub fn txn(&self) -> TxnId {
        self.txn
    }

    /// Mode in which `block` is held, if at all.
    pub fn lock_mode(&self, block: &BlockId) -> Option<LockMode> {
        self.locks.get(block).copied()
    }

    /// Take a shared lock on `block` unless some lock is already held.
    ///
    /// # Errors
    /// `Error::LockAbort` from the lock table.
    pub fn slock(&mut self, block: &BlockId) -> Result<()> {
        if !self.locks.contains_key(block) {
            self.lock_table.acquire_shared(block, self.txn)?;
            self.locks.insert(block.clone(), LockMode::Shared);
        }
        Ok(())
    }

    /// Take the exclusive lock on `block`, going through a shared lock first.
    ///
    /// # Errors
    /// `Error::LockAbort` from the lock table. A shared lock obtained on
    /// the way stays recorded and is released with the others.
    pub fn xlock(&mut self, block: &BlockId) -> Result<()> {
        if self.lock_mode(block) != Some(LockMode::Exclusive) {
            self.slock(block)?;
            self.lock_table.acquire_exclusive(block, self.txn)?;
            self.locks.insert(block.clone(), LockMode::Exclusive);
        }
        Ok(())
    }

    /// Release every lock this transaction holds.
    pub fn release_all(&mut self) {
        if self.locks.is_empty() {
            return;
        }

        debug!(txn = %self.txn, count = self.locks.len(), "releasing locks");
        for block in self.locks.keys() {
            self.lock_table.release(block, self.txn);
        }
        self.locks.clear();
    }
}

impl Drop for ConcurrencyManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
