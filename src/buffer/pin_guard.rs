//! RAII guard for a pinned buffer.
//!
//! [`PinnedBuffer`] holds one pin on a frame and releases it when dropped,
//! so early returns and `?` cannot leak a pin.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::buffer_manager::BufferManager;
use super::frame::Buffer;

/// Guard for a pinned frame.
///
/// Derefs to [`Buffer`], so the page and modification API are available
/// directly. The frame is unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let guard = bm.pin_scoped(&block)?;
/// let value = guard.page().get_i32(0);
/// // guard drops here, frame unpinned
/// ```
pub struct PinnedBuffer<'a> {
    /// Reference back to the manager for unpin on drop.
    manager: &'a BufferManager,
    buffer: Arc<Buffer>,
}

impl<'a> PinnedBuffer<'a> {
    /// Called by `BufferManager::pin_scoped()` with a freshly pinned frame.
    pub(crate) fn new(manager: &'a BufferManager, buffer: Arc<Buffer>) -> Self {
        Self { manager, buffer }
    }

    /// The pinned frame.
    #[inline]
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }
}

impl Deref for PinnedBuffer<'_> {
    type Target = Buffer;

    #[inline]
    fn deref(&self) -> &Buffer {
        &self.buffer
    }
}

impl Drop for PinnedBuffer<'_> {
    fn drop(&mut self) {
        self.manager.unpin(&self.buffer);
    }
}

impl fmt::Debug for PinnedBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("buffer", &self.buffer)
            .finish()
    }
}
