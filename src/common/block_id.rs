//! Block identifier type.

use std::fmt;

/// Identifies a block on disk: a file name plus a block number.
///
/// This is the key space of both the lock table and the buffer pool's
/// block-to-frame mapping, so equality and hashing are by value.
///
/// # Example
/// ```
/// use blockmgr::BlockId;
///
/// let blk = BlockId::new("students.tbl", 7);
/// assert_eq!(blk.file_name(), "students.tbl");
/// assert_eq!(blk.number(), 7);
/// assert_eq!(blk, BlockId::new("students.tbl", 7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    file_name: String,
    number: u64,
}

impl BlockId {
    /// Create a new BlockId.
    pub fn new(file_name: impl Into<String>, number: u64) -> Self {
        Self {
            file_name: file_name.into(),
            number,
        }
    }

    /// Name of the file holding this block.
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Position of the block within its file.
    #[inline]
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_block_id_new() {
        let blk = BlockId::new("a.tbl", 42);
        assert_eq!(blk.file_name(), "a.tbl");
        assert_eq!(blk.number(), 42);
    }

    #[test]
    fn test_block_id_equality_by_value() {
        assert_eq!(BlockId::new("a", 1), BlockId::new(String::from("a"), 1));
        assert_ne!(BlockId::new("a", 1), BlockId::new("a", 2));
        assert_ne!(BlockId::new("a", 1), BlockId::new("b", 1));

        let mut set = HashSet::new();
        set.insert(BlockId::new("a", 1));
        assert!(set.contains(&BlockId::new("a", 1)));
    }

    #[test]
    fn test_block_id_ordering() {
        assert!(BlockId::new("a", 9) < BlockId::new("b", 0));
        assert!(BlockId::new("a", 1) < BlockId::new("a", 2));
    }

    #[test]
    fn test_block_id_display() {
        assert_eq!(
            format!("{}", BlockId::new("log", 3)),
            "[file log, block 3]"
        );
    }
}
