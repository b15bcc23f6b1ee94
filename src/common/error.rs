//! Error types for blockmgr.

use thiserror::Error;

use crate::common::{BlockId, Lsn, TxnId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in blockmgr.
///
/// `LockAbort` and `BufferAbort` are terminal for the requesting
/// transaction: the caller is expected to roll it back.
#[derive(Debug, Error)]
pub enum Error {
    /// A lock could not be acquired.
    ///
    /// Raised when the age rule disqualifies the requester or when the
    /// wait exceeded its deadline. The two causes are not distinguished.
    #[error("could not acquire lock on {block} for {txn}")]
    LockAbort { block: BlockId, txn: TxnId },

    /// No frame became available for the block before the deadline.
    #[error("could not pin {block}: no buffer available")]
    BufferAbort { block: BlockId },

    /// I/O error from the file or log layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested block lies beyond the end of its file.
    #[error("{0} not found")]
    BlockNotFound(BlockId),

    /// File name is empty or tries to escape the database directory.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// A log record is too long for its 32-bit length prefix.
    #[error("log record of {len} bytes exceeds the frame limit")]
    RecordTooLarge { len: usize },

    /// A log record failed its checksum when read back.
    #[error("corrupt log record at {lsn}")]
    CorruptLogRecord { lsn: Lsn },
}

impl Error {
    /// Returns true for the two abort kinds that require a rollback.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::LockAbort { .. } | Error::BufferAbort { .. })
    }
}
