//! Frame identifier type.

use std::fmt;

/// Index of a buffer frame within the pool.
///
/// Frames are allocated once, in order, when the pool is built, so the id
/// doubles as the position in the manager's frame vector.
///
/// # Example
/// ```
/// use blockmgr::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.index(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }

    /// Position of the frame in the pool.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_index() {
        assert_eq!(FrameId::new(10).index(), 10);
        assert_eq!(FrameId::new(5), FrameId::new(5));
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Buffer(42)");
    }
}
