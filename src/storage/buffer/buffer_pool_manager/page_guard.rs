use crate::common::Result;
use crate::storage::buffer::buffer_pool_manager::BufferPoolManager;
use crate::storage::disk::disk_manager::PageId;
use crate::storage::page::PageHandle;
use std::sync::{Arc, RwLock};

/// Scoped pin on a buffer-pool page.
///
/// A guard is the only way index code touches pages: construction pins,
/// `Drop` unpins exactly once on every exit path, and `mark_dirty` latches
/// the dirty flag handed to that final unpin. Holding a guard across a call
/// that locks the buffer pool is fine; dropping one while a buffer-pool
/// lock is held is not, since the drop takes that lock itself.
#[derive(Debug)]
pub struct PageGuard {
    buffer_pool_manager: Arc<RwLock<BufferPoolManager>>,
    page: PageHandle,
    page_id: PageId,
    is_dirty: bool,
}

impl PageGuard {
    /// Pins the existing page `page_id`.
    pub fn fetch(
        buffer_pool_manager: &Arc<RwLock<BufferPoolManager>>,
        page_id: PageId,
    ) -> Result<Self> {
        let page = buffer_pool_manager.write().unwrap().fetch_page(&page_id)?;
        Ok(Self {
            buffer_pool_manager: Arc::clone(buffer_pool_manager),
            page,
            page_id,
            is_dirty: false,
        })
    }

    /// Allocates a fresh zeroed page and pins it.
    pub fn allocate(buffer_pool_manager: &Arc<RwLock<BufferPoolManager>>) -> Result<Self> {
        let (page_id, page) = buffer_pool_manager.write().unwrap().new_page()?;
        Ok(Self {
            buffer_pool_manager: Arc::clone(buffer_pool_manager),
            page,
            page_id,
            is_dirty: false,
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Marks the page as modified; the final unpin reports it dirty.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        // Skip the unpin rather than double-panic if the pool lock was
        // poisoned by a panicking test.
        if let Ok(mut buffer_pool_manager) = self.buffer_pool_manager.write() {
            buffer_pool_manager.unpin_page(&self.page_id, self.is_dirty);
        }
    }
}
