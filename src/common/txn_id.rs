//! Transaction and log sequence identifiers.

use std::fmt;

/// Identifies a transaction.
///
/// Ids are assigned in strictly increasing order at transaction start, so
/// a lower id means an older transaction. The lock table's age rule relies
/// on this ordering.
///
/// # Example
/// ```
/// use blockmgr::TxnId;
///
/// assert!(TxnId::new(3).is_older_than(TxnId::new(5)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Create a new TxnId.
    #[inline]
    pub fn new(id: u64) -> Self {
        TxnId(id)
    }

    /// True if `self` started before `other`.
    #[inline]
    pub fn is_older_than(self, other: TxnId) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}

/// Log sequence number: position of a record in the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lsn(pub u64);

impl Lsn {
    /// Create a new Lsn.
    #[inline]
    pub fn new(lsn: u64) -> Self {
        Lsn(lsn)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lsn({})", self.0)
    }
}
