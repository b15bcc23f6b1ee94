//! Buffer Manager - pins blocks into a fixed pool of frames.
//!
//! The [`BufferManager`] provides:
//! - Reentrant, reference-counted pinning of blocks to frames
//! - FIFO reuse of unpinned frames
//! - Bounded waiting when every frame is pinned
//! - Write-back of the frames a transaction modified

use std::collections::HashMap;
use std::ptr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::buffer::unpinned::UnpinnedQueue;
use crate::buffer::{Buffer, BufferStats, PinnedBuffer};
use crate::common::{BlockId, Error, FrameId, Result, TxnId, WaitPolicy};
use crate::log::LogFlush;
use crate::storage::BlockStore;

/// Pool bookkeeping, guarded by the manager's monitor.
#[derive(Debug)]
struct PoolState {
    /// Block → frame for every bound frame, pinned or not.
    bound: HashMap<BlockId, FrameId>,

    /// Frames with pin count zero, oldest-released first.
    unpinned: UnpinnedQueue,
}

impl PoolState {
    /// Frames with pin count zero.
    fn available(&self) -> usize {
        self.unpinned.len()
    }
}

/// Manages a fixed pool of buffer frames.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                       BufferManager                         │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐    │
/// │  │ bound        │  │    frames: Vec<Arc<Buffer>>       │    │
/// │  │BlockId → Fid │─▶│  [Buf0] [Buf1] [Buf2] ...         │    │
/// │  └──────────────┘  └───────────────────────────────────┘    │
/// │  ┌──────────────┐  ┌──────────────┐                         │
/// │  │  unpinned    │  │ frame_freed  │  BlockStore + LogFlush  │
/// │  │ FIFO queue   │  │   Condvar    │  shared by every frame  │
/// │  └──────────────┘  └──────────────┘                         │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// `bound` and `unpinned` live under one `Mutex`; every public operation
/// runs under it, including frame reads and write-backs. `frame_freed` is
/// broadcast on every unpin that frees a frame and each waiter re-checks
/// its own request.
///
/// # Invariants
/// - `available()` + number of pinned frames == `pool_size()`
/// - A pinned frame is never rebound
/// - A block is bound to at most one frame
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use blockmgr::buffer::BufferManager;
/// use blockmgr::log::LogManager;
/// use blockmgr::storage::{BlockStore, FileManager};
/// use blockmgr::TxnId;
///
/// let dir = tempfile::tempdir().unwrap();
/// let fm = Arc::new(FileManager::open(dir.path().join("db")).unwrap());
/// let log = Arc::new(LogManager::open(dir.path().join("wal.log")).unwrap());
/// let bm = BufferManager::new(fm.clone(), log, 3);
///
/// let blk = fm.append_new_block("data.tbl").unwrap();
/// let buffer = bm.pin(&blk).unwrap();
/// buffer.page_mut().set_i32(0, 42);
/// buffer.set_modified(TxnId::new(1), None);
/// bm.unpin(&buffer);
///
/// bm.flush_modified_by(TxnId::new(1)).unwrap();
/// assert_eq!(bm.available(), 3);
/// ```
pub struct BufferManager {
    /// Fixed pool of frames allocated at construction.
    frames: Vec<Arc<Buffer>>,

    policy: WaitPolicy,

    state: Mutex<PoolState>,

    /// Signalled whenever a frame's pin count drops to zero.
    frame_freed: Condvar,

    stats: BufferStats,
}

impl BufferManager {
    /// Create a buffer manager with `pool_size` frames and the default
    /// wait policy (10s deadline).
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(store: Arc<dyn BlockStore>, log: Arc<dyn LogFlush>, pool_size: usize) -> Self {
        Self::with_policy(store, log, pool_size, WaitPolicy::default())
    }

    /// Create a buffer manager with a custom wait policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_policy(
        store: Arc<dyn BlockStore>,
        log: Arc<dyn LogFlush>,
        pool_size: usize,
        policy: WaitPolicy,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames = (0..pool_size)
            .map(|id| Arc::new(Buffer::new(FrameId::new(id), store.clone(), log.clone())))
            .collect();

        Self {
            frames,
            policy,
            state: Mutex::new(PoolState {
                bound: HashMap::new(),
                unpinned: UnpinnedQueue::with_frames(pool_size),
            }),
            frame_freed: Condvar::new(),
            stats: BufferStats::new(),
        }
    }

    // ========================================================================
    // Public API: Pin and unpin
    // ========================================================================

    /// Pin `block` to a frame and return the frame.
    ///
    /// A frame already bound to `block` is reused, whether pinned or not.
    /// Otherwise the oldest unpinned frame is flushed, rebound and loaded.
    /// If every frame is pinned, waits until one is freed, up to the
    /// policy's `max_wait`.
    ///
    /// Every successful pin must be matched by one [`unpin`](Self::unpin).
    ///
    /// # Errors
    /// - `Error::BufferAbort` if no frame became available in time
    /// - I/O errors from writing back the evicted frame or reading `block`
    pub fn pin(&self, block: &BlockId) -> Result<Arc<Buffer>> {
        let mut state = self.state.lock();
        let deadline = self.policy.deadline(Instant::now());
        let mut waited = false;

        loop {
            if let Some(frame_id) = self.try_to_pin(&mut state, block)? {
                return Ok(Arc::clone(&self.frames[frame_id.index()]));
            }

            let Some(timeout) = self.policy.next_wait(deadline, Instant::now()) else {
                BufferStats::bump(&self.stats.aborts);
                warn!(%block, pool_size = self.frames.len(), "pin timed out, every buffer is pinned");
                return Err(Error::BufferAbort {
                    block: block.clone(),
                });
            };

            if !waited {
                BufferStats::bump(&self.stats.waits);
                debug!(%block, "waiting for a free buffer");
                waited = true;
            }
            self.frame_freed.wait_for(&mut state, timeout);
        }
    }

    /// Pin `block` and return a guard that unpins it when dropped.
    ///
    /// # Errors
    /// Same as [`pin`](Self::pin).
    pub fn pin_scoped(&self, block: &BlockId) -> Result<PinnedBuffer<'_>> {
        let buffer = self.pin(block)?;
        Ok(PinnedBuffer::new(self, buffer))
    }

    /// Release one pin on `buffer`.
    ///
    /// When the pin count reaches zero the frame joins the back of the
    /// unpinned queue and every waiting `pin` is woken. Unpinning a frame
    /// that is not pinned, or that belongs to another pool, is a no-op.
    pub fn unpin(&self, buffer: &Buffer) {
        let mut state = self.state.lock();

        if !self.owns(buffer) {
            warn!(frame = %buffer.id(), "unpin of foreign buffer ignored");
            return;
        }
        if !buffer.is_pinned() {
            warn!(frame = %buffer.id(), "unpin of unpinned buffer ignored");
            return;
        }

        if buffer.unpin() == 0 {
            state.unpinned.push_back(buffer.id());
            drop(state);

            trace!(frame = %buffer.id(), "buffer unpinned");
            self.frame_freed.notify_all();
        }
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Write back every frame last modified by `txn`, pinned or not.
    ///
    /// # Errors
    /// I/O errors from the log or block store; frames flushed before the
    /// failure stay flushed.
    pub fn flush_modified_by(&self, txn: TxnId) -> Result<()> {
        let _state = self.state.lock();

        let mut flushed = 0;
        for buffer in self.frames.iter().filter(|b| b.modifying_txn() == Some(txn)) {
            if buffer.flush()? {
                BufferStats::bump(&self.stats.pages_written);
                flushed += 1;
            }
        }

        debug!(%txn, flushed, "flushed buffers for transaction");
        Ok(())
    }

    /// Write back every modified frame.
    ///
    /// # Errors
    /// I/O errors from the log or block store.
    pub fn flush_all(&self) -> Result<()> {
        let _state = self.state.lock();

        for buffer in &self.frames {
            if buffer.flush()? {
                BufferStats::bump(&self.stats.pages_written);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Inspection
    // ========================================================================

    /// Number of frames with pin count zero. Advisory: not a reservation.
    pub fn available(&self) -> usize {
        self.state.lock().available()
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Pin count of the frame bound to `block`, if any.
    pub fn pin_count(&self, block: &BlockId) -> Option<u32> {
        let state = self.state.lock();
        state
            .bound
            .get(block)
            .map(|id| self.frames[id.index()].pin_count())
    }

    /// Unpinned frames in the order they will be reused.
    pub fn unpinned_frames(&self) -> Vec<FrameId> {
        self.state.lock().unpinned.iter().collect()
    }

    /// The wait policy in effect.
    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Buffer manager statistics.
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn owns(&self, buffer: &Buffer) -> bool {
        self.frames
            .get(buffer.id().index())
            .is_some_and(|frame| ptr::eq(frame.as_ref(), buffer))
    }

    /// One allocation attempt. `Ok(None)` means every frame is pinned.
    fn try_to_pin(&self, state: &mut PoolState, block: &BlockId) -> Result<Option<FrameId>> {
        let frame_id = match state.bound.get(block) {
            Some(&frame_id) => {
                BufferStats::bump(&self.stats.hits);
                frame_id
            }
            None => {
                let Some(frame_id) = state.unpinned.pop_front() else {
                    return Ok(None);
                };

                BufferStats::bump(&self.stats.misses);
                if let Err(e) = self.bind(state, frame_id, block) {
                    state.unpinned.push_front(frame_id);
                    return Err(e);
                }
                frame_id
            }
        };

        let buffer = &self.frames[frame_id.index()];
        if !buffer.is_pinned() {
            state.unpinned.remove(frame_id);
        }
        buffer.pin();

        trace!(%block, frame = %frame_id, pins = buffer.pin_count(), "pinned");
        Ok(Some(frame_id))
    }

    /// Rebind an unpinned frame to `block`, writing back its old contents.
    ///
    /// On failure the mapping reflects whatever binding the frame kept.
    fn bind(&self, state: &mut PoolState, frame_id: FrameId, block: &BlockId) -> Result<()> {
        let buffer = &self.frames[frame_id.index()];

        if buffer.flush()? {
            BufferStats::bump(&self.stats.pages_written);
        }

        let previous = buffer.block();
        let result = buffer.assign_to_block(block.clone());

        if let Some(previous) = previous {
            state.bound.remove(&previous);
            BufferStats::bump(&self.stats.reassignments);
            debug!(frame = %frame_id, from = %previous, to = %block, "reassigned buffer");
        }

        result?;
        BufferStats::bump(&self.stats.pages_read);
        state.bound.insert(block.clone(), frame_id);
        Ok(())
    }
}
