//! The page I/O contract used by buffer frames.

use crate::common::{BlockId, Result};
use crate::storage::page::Page;

/// Reads and writes fixed-size blocks.
///
/// Buffer frames call into a `BlockStore` when they load a block and when
/// they write modified contents back. Implementations must be safe to
/// share between threads; the buffer manager already serializes the calls
/// it makes, but other components may use the same store concurrently.
pub trait BlockStore: Send + Sync {
    /// Fill `page` with the contents of `block`.
    ///
    /// # Errors
    /// `Error::BlockNotFound` if the block lies beyond the end of its file.
    fn read(&self, block: &BlockId, page: &mut Page) -> Result<()>;

    /// Write `page` as the new contents of `block`.
    ///
    /// # Errors
    /// `Error::BlockNotFound` if the block has not been appended yet.
    fn write(&self, block: &BlockId, page: &Page) -> Result<()>;

    /// Extend `file_name` by one zeroed block and return its id.
    fn append_new_block(&self, file_name: &str) -> Result<BlockId>;

    /// Number of blocks currently in `file_name` (0 if it does not exist).
    fn block_count(&self, file_name: &str) -> Result<u64>;
}
