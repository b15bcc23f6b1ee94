//! Write-ahead log.
//!
//! Buffer frames only need one thing from the log: that every record up to
//! a given LSN is durable before a modified page is written. That contract
//! is [`LogFlush`]; [`LogManager`] is the file-backed implementation.

mod log_manager;

pub use log_manager::LogManager;

use crate::common::{Lsn, Result};

/// Makes log records durable up to a sequence number.
pub trait LogFlush: Send + Sync {
    /// Ensure every record with sequence number `<= lsn` is on disk.
    fn flush(&self, lsn: Lsn) -> Result<()>;
}
