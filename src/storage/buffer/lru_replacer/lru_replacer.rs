use crate::storage::buffer::buffer_pool_manager::FrameId;
use std::collections::VecDeque;

/// Tracks the frames eligible for eviction in least-recently-used order.
///
/// The buffer pool inserts a frame when its pin count drops to zero and
/// erases it when the frame is pinned, evicted, or freed, so membership is
/// exactly the set of unpinned resident frames. The most recently released
/// frame sits at the front; victims are taken from the back.
#[derive(Debug, Default)]
pub struct LRUReplacer {
    lru: VecDeque<FrameId>,
}

impl LRUReplacer {
    pub fn new() -> Self {
        Self {
            lru: VecDeque::new(),
        }
    }

    /// Moves `frame_id` to the most-recently-used position, inserting it if
    /// absent. Re-inserting an already tracked frame is a re-reference, not
    /// an error.
    pub fn insert(&mut self, frame_id: FrameId) {
        self.erase(&frame_id);
        self.lru.push_front(frame_id);
    }

    /// Removes and returns the least recently used frame.
    ///
    /// # Returns
    /// - `Some(frame_id)` of the victim, or `None` when no frame is
    ///   evictable
    pub fn victim(&mut self) -> Option<FrameId> {
        self.lru.pop_back()
    }

    /// # Returns
    /// - `true` if the frame was tracked and has been removed
    pub fn erase(&mut self, frame_id: &FrameId) -> bool {
        match self.lru.iter().position(|tracked| tracked == frame_id) {
            Some(index) => {
                self.lru.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn size(&self) -> usize {
        self.lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, frame_id: &FrameId) -> bool {
        self.lru.contains(frame_id)
    }
}
