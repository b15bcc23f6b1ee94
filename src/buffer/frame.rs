//! Buffer - one frame of the buffer pool.
//!
//! A [`Buffer`] holds a [`Page`] plus the metadata buffer management needs:
//! - Which block is loaded (if any)
//! - Pin count
//! - Which transaction last modified the contents, and the LSN of the log
//!   record describing that change

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::common::{BlockId, FrameId, Lsn, Result, TxnId};
use crate::log::LogFlush;
use crate::storage::page::Page;
use crate::storage::BlockStore;

/// Binding and modification state, guarded together.
#[derive(Debug, Default)]
struct FrameMeta {
    block: Option<BlockId>,
    modified_by: Option<TxnId>,
    lsn: Option<Lsn>,
}

/// A frame in the buffer pool.
///
/// Frames are created once by the `BufferManager` and live as long as it
/// does. Callers get an `Arc<Buffer>` from `pin` and hand it back to
/// `unpin`; they never own the frame's lifetime.
///
/// # Thread Safety
/// - `page`: `RwLock`; callers coordinate content access through the lock
///   table, the `RwLock` only keeps reads and writes memory-safe
/// - `meta`: `Mutex`; when both are needed `page` is taken first, so a
///   caller may call `set_modified` while holding a `page_mut()` guard
/// - `pins`: `AtomicU32`, changed only under the manager's monitor
///
/// Do not hold a `page()`/`page_mut()` guard across calls into the
/// `BufferManager`: flushing takes the page lock.
pub struct Buffer {
    id: FrameId,
    store: Arc<dyn BlockStore>,
    log: Arc<dyn LogFlush>,
    page: RwLock<Page>,
    meta: Mutex<FrameMeta>,
    pins: AtomicU32,
}

impl Buffer {
    pub(crate) fn new(id: FrameId, store: Arc<dyn BlockStore>, log: Arc<dyn LogFlush>) -> Self {
        Self {
            id,
            store,
            log,
            page: RwLock::new(Page::new()),
            meta: Mutex::new(FrameMeta::default()),
            pins: AtomicU32::new(0),
        }
    }

    /// Index of this frame in the pool.
    #[inline]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Block currently bound to this frame.
    pub fn block(&self) -> Option<BlockId> {
        self.meta.lock().block.clone()
    }

    // ========================================================================
    // Contents
    // ========================================================================

    /// Shared access to the page contents.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Exclusive access to the page contents.
    ///
    /// Call [`set_modified`](Self::set_modified) after changing the page,
    /// otherwise the change is never written back.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Record that `txn` changed the contents.
    ///
    /// `lsn` is the log record describing the change; pass `None` for
    /// changes that were not logged, which keeps the previous LSN.
    pub fn set_modified(&self, txn: TxnId, lsn: Option<Lsn>) {
        let mut meta = self.meta.lock();
        meta.modified_by = Some(txn);
        if lsn.is_some() {
            meta.lsn = lsn;
        }
    }

    /// Transaction whose change has not been written back yet.
    pub fn modifying_txn(&self) -> Option<TxnId> {
        self.meta.lock().modified_by
    }

    /// True if the contents differ from the block on disk.
    pub fn is_modified(&self) -> bool {
        self.modifying_txn().is_some()
    }

    /// LSN of the latest logged modification.
    pub fn lsn(&self) -> Option<Lsn> {
        self.meta.lock().lsn
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    /// True if at least one caller holds this frame.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Increment the pin count. Returns the new count.
    pub(crate) fn pin(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new count.
    ///
    /// # Panics
    /// Panics if the pin count is already 0.
    pub(crate) fn unpin(&self) -> u32 {
        let old = self.pins.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    // ========================================================================
    // Disk traffic
    // ========================================================================

    /// Write modified contents back to their block.
    ///
    /// The log is flushed up to the frame's LSN first, so no page reaches
    /// disk ahead of the log records describing it. Returns true if a page
    /// was written.
    pub(crate) fn flush(&self) -> Result<bool> {
        let page = self.page.read();
        let mut meta = self.meta.lock();
        let (Some(txn), Some(block)) = (meta.modified_by, meta.block.as_ref()) else {
            return Ok(false);
        };

        if let Some(lsn) = meta.lsn {
            self.log.flush(lsn)?;
        }
        self.store.write(block, &page)?;

        debug!(frame = %self.id, %block, %txn, "flushed buffer");
        meta.modified_by = None;
        Ok(true)
    }

    /// Bind this frame to `block` and load its contents.
    ///
    /// The caller flushes the previous contents first. If the read fails the
    /// frame is left unbound with zeroed contents.
    pub(crate) fn assign_to_block(&self, block: BlockId) -> Result<()> {
        let mut page = self.page.write();
        let mut meta = self.meta.lock();
        debug_assert!(meta.modified_by.is_none(), "rebinding a modified frame");

        meta.modified_by = None;
        meta.lsn = None;

        match self.store.read(&block, &mut page) {
            Ok(()) => {
                meta.block = Some(block);
                Ok(())
            }
            Err(e) => {
                page.reset();
                meta.block = None;
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta.lock();
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("block", &meta.block)
            .field("pins", &self.pin_count())
            .field("modified_by", &meta.modified_by)
            .field("lsn", &meta.lsn)
            .finish()
    }
}
