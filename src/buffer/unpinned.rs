//! FIFO queue of frames with pin count zero.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// Frames eligible for reuse, oldest-released first.
///
/// A frame appears at most once. Frames re-pinned while still bound leave
/// the queue from wherever they are; a new binding always takes the frame
/// at the front.
#[derive(Debug, Default)]
pub(crate) struct UnpinnedQueue {
    /// Frame ids in release order (front = oldest).
    queue: VecDeque<FrameId>,

    /// Set for O(1) membership checks.
    members: HashSet<FrameId>,
}

impl UnpinnedQueue {
    /// Queue holding frames `0..pool_size` in order.
    pub(crate) fn with_frames(pool_size: usize) -> Self {
        let mut unpinned = Self::default();
        for id in 0..pool_size {
            unpinned.push_back(FrameId::new(id));
        }
        unpinned
    }

    /// Append a frame that just reached pin count zero.
    ///
    /// Returns false if it was already queued.
    pub(crate) fn push_back(&mut self, frame_id: FrameId) -> bool {
        if !self.members.insert(frame_id) {
            return false;
        }
        self.queue.push_back(frame_id);
        true
    }

    /// Put a frame back at the head, for a binding that could not complete.
    pub(crate) fn push_front(&mut self, frame_id: FrameId) {
        if self.members.insert(frame_id) {
            self.queue.push_front(frame_id);
        }
    }

    /// Take the oldest unpinned frame.
    pub(crate) fn pop_front(&mut self) -> Option<FrameId> {
        let frame_id = self.queue.pop_front()?;
        self.members.remove(&frame_id);
        Some(frame_id)
    }

    /// Drop a frame that is being pinned again. Returns true if it was queued.
    pub(crate) fn remove(&mut self, frame_id: FrameId) -> bool {
        if !self.members.remove(&frame_id) {
            return false;
        }
        self.queue.retain(|&id| id != frame_id);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Frame ids front to back.
    pub(crate) fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.queue.iter().copied()
    }
}
