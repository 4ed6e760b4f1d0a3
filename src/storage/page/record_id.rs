use crate::storage::disk::disk_manager::PageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a record slot: the page holding the tuple and the slot number
/// within it. Used as the value type of leaf index entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    page_id: PageId,
    slot_id: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: u32) -> Self {
        Self { page_id, slot_id }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_id(&self) -> u32 {
        self.slot_id
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}
