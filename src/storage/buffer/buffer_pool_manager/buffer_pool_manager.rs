use crate::common::constants::{INVALID_PID, NO_CORRESPONDING_FRAME_ID_MSG};
use crate::common::{Error, Result};
use crate::config::config::STORAGE_CONFIG;
use crate::container::extendible_hash_table::ExtendibleHashTable;
use crate::storage::buffer::lru_replacer::LRUReplacer;
use crate::storage::disk::disk_manager::{DiskManager, PageId};
use crate::storage::page::{Page, PageHandle};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

pub type FrameId = usize;

#[derive(Debug)]
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool.
    pub(crate) pool_size: usize,
    /// The frame array.
    pub(crate) pages: Vec<PageHandle>,
    /// Extendible hash table mapping page ids to frame ids.
    pub(crate) page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Manages reads and writes of pages on disk.
    pub(crate) disk_manager: Arc<RwLock<DiskManager>>,
    /// Selects eviction victims among unpinned resident frames.
    pub(crate) replacer: Arc<RwLock<LRUReplacer>>,
    /// Frames that hold no page at all.
    pub(crate) free_list: VecDeque<FrameId>,
}

#[derive(Default)]
pub struct BufferPoolManagerBuilder {
    pool_size: Option<usize>,
    bucket_size: Option<usize>,
    disk_manager: Option<Arc<RwLock<DiskManager>>>,
}

impl BufferPoolManagerBuilder {
    pub fn pool_size(&mut self, pool_size: usize) -> &mut Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn bucket_size(&mut self, bucket_size: usize) -> &mut Self {
        self.bucket_size = Some(bucket_size);
        self
    }

    pub fn disk_manager(&mut self, disk_manager: Arc<RwLock<DiskManager>>) -> &mut Self {
        self.disk_manager = Some(disk_manager);
        self
    }

    pub fn build(&self) -> BufferPoolManager {
        let pool_size = self.pool_size.unwrap_or(STORAGE_CONFIG.pool_size);
        let bucket_size = self.bucket_size.unwrap_or(STORAGE_CONFIG.bucket_size);
        let disk_manager = self
            .disk_manager
            .clone()
            .expect("`disk_manager` not initialized before build.");

        BufferPoolManager::new(pool_size, bucket_size, disk_manager)
    }

    pub fn build_with_handle(&self) -> Arc<RwLock<BufferPoolManager>> {
        Arc::new(RwLock::new(self.build()))
    }
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        bucket_size: usize,
        disk_manager: Arc<RwLock<DiskManager>>,
    ) -> Self {
        BufferPoolManager {
            pool_size,
            pages: (0..pool_size)
                .map(|_| Arc::new(RwLock::new(Page::new_invalid())))
                .collect(),
            page_table: ExtendibleHashTable::new(bucket_size),
            disk_manager,
            replacer: Arc::new(RwLock::new(LRUReplacer::new())),
            free_list: (0..pool_size).collect(),
        }
    }

    pub fn new_with_handle(
        pool_size: usize,
        bucket_size: usize,
        disk_manager: Arc<RwLock<DiskManager>>,
    ) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self::new(pool_size, bucket_size, disk_manager)))
    }

    pub fn builder() -> BufferPoolManagerBuilder {
        BufferPoolManagerBuilder::default()
    }

    /// Fetches the page with id `page_id`, pinning it.
    ///
    /// A resident page is returned as-is; its bytes are never re-read from
    /// disk, so modifications made while it was pinned earlier stay visible.
    /// On a miss a frame is taken from the free list or, failing that, from
    /// the replacer; a dirty victim is written back before its frame is
    /// reused.
    ///
    /// # Returns
    /// - the pinned page handle
    /// - `Error::BufferPoolFull` if every frame is pinned
    pub fn fetch_page(&mut self, page_id: &PageId) -> Result<PageHandle> {
        if let Some(frame_id) = self.page_table.find(page_id) {
            let handle = Arc::clone(&self.pages[frame_id]);
            handle.write().unwrap().increment_pin_count();
            self.replacer.write().unwrap().erase(&frame_id);
            return Ok(handle);
        }

        let frame_id = self.acquire_frame()?;
        let handle = Arc::clone(&self.pages[frame_id]);
        {
            let mut page = handle.write().unwrap();
            self.disk_manager
                .write()
                .unwrap()
                .read_page(*page_id, page.data_mut())?;
            page.page_id = *page_id;
            page.pin_count = 1;
            page.is_dirty = false;
        }
        self.page_table.insert(*page_id, frame_id);
        Ok(handle)
    }

    /// Allocates a brand-new page, pins it, and zeroes its data area.
    ///
    /// # Returns
    /// - the new page id together with the pinned handle
    /// - `Error::BufferPoolFull` if every frame is pinned
    pub fn new_page(&mut self) -> Result<(PageId, PageHandle)> {
        let frame_id = self.acquire_frame()?;
        let page_id = self.disk_manager.write().unwrap().allocate_page();
        let handle = Arc::clone(&self.pages[frame_id]);
        {
            let mut page = handle.write().unwrap();
            page.zero_data();
            page.page_id = page_id;
            page.pin_count = 1;
            page.is_dirty = false;
        }
        self.page_table.insert(page_id, frame_id);
        Ok((page_id, handle))
    }

    /// Picks a frame for reuse: the free list first, then an eviction
    /// victim. The victim's mapping is removed and its content written back
    /// if dirty.
    fn acquire_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Ok(frame_id);
        }
        let frame_id = self
            .replacer
            .write()
            .unwrap()
            .victim()
            .ok_or(Error::BufferPoolFull)?;
        let handle = Arc::clone(&self.pages[frame_id]);
        let mut page = handle.write().unwrap();
        debug_assert_eq!(page.pin_count, 0, "evicting a pinned frame");
        if page.is_dirty {
            self.disk_manager
                .write()
                .unwrap()
                .write_page(page.page_id, page.data())?;
        }
        log::debug!("evicted page {} from frame {frame_id}", page.page_id);
        self.page_table.remove(&page.page_id);
        page.reset();
        Ok(frame_id)
    }

    /// Releases one pin on `page_id`, OR-ing `is_dirty` into the frame's
    /// dirty flag. When the pin count reaches zero the frame becomes an
    /// eviction candidate.
    ///
    /// # Returns
    /// - `false` if the page is not resident or was not pinned
    pub fn unpin_page(&mut self, page_id: &PageId, is_dirty: bool) -> bool {
        let Some(frame_id) = self.page_table.find(page_id) else {
            log::warn!("unpin of non-resident page {page_id}");
            return false;
        };
        let handle = Arc::clone(&self.pages[frame_id]);
        let mut page = handle.write().unwrap();
        if page.pin_count == 0 {
            log::warn!("unpin of unpinned page {page_id}");
            return false;
        }
        page.is_dirty |= is_dirty;
        page.decrement_pin_count();
        if page.pin_count == 0 {
            self.replacer.write().unwrap().insert(frame_id);
        }
        true
    }

    /// Writes the page's current content to disk and clears its dirty flag,
    /// regardless of whether it is dirty or pinned. The replacer is not
    /// consulted or updated.
    ///
    /// # Returns
    /// - `Error::PageNotFound` if the page is not resident, including for
    ///   `INVALID_PID`
    pub fn flush_page(&mut self, page_id: &PageId) -> Result<()> {
        if *page_id == INVALID_PID {
            return Err(Error::PageNotFound(*page_id));
        }
        let frame_id = self
            .page_table
            .find(page_id)
            .ok_or(Error::PageNotFound(*page_id))?;
        let handle = Arc::clone(&self.pages[frame_id]);
        let mut page = handle.write().unwrap();
        self.disk_manager
            .write()
            .unwrap()
            .write_page(page.page_id, page.data())?;
        page.is_dirty = false;
        Ok(())
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&mut self) -> Result<()> {
        let page_ids: Vec<PageId> = self.page_table.iter().map(|(page_id, _)| *page_id).collect();
        for page_id in page_ids {
            self.flush_page(&page_id)?;
        }
        Ok(())
    }

    /// Removes a page from the pool and deallocates it on disk. Deletion is
    /// never forced: a pinned page stays put.
    ///
    /// # Returns
    /// - `false` if the page is not resident or still pinned
    pub fn delete_page(&mut self, page_id: PageId) -> bool {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let handle = Arc::clone(&self.pages[frame_id]);
        {
            let mut page = handle.write().unwrap();
            if page.pin_count > 0 {
                return false;
            }
            page.reset();
        }
        self.page_table.remove(&page_id);
        self.replacer.write().unwrap().erase(&frame_id);
        self.free_list.push_back(frame_id);
        self.disk_manager.write().unwrap().deallocate_page(page_id);
        true
    }

    pub fn size(&self) -> usize {
        self.pool_size
    }

    pub(crate) fn get_pin_count(&self, page_id: &PageId) -> Option<usize> {
        let frame_id = self.page_table.find(page_id)?;
        Some(self.pages[frame_id].read().unwrap().pin_count())
    }

    pub(crate) fn get_is_dirty(&self, page_id: &PageId) -> bool {
        let frame_id = self
            .page_table
            .find(page_id)
            .expect(NO_CORRESPONDING_FRAME_ID_MSG);
        self.pages[frame_id].read().unwrap().is_dirty()
    }

    pub(crate) fn set_is_dirty(&mut self, page_id: &PageId, is_dirty: bool) {
        let frame_id = self
            .page_table
            .find(page_id)
            .expect(NO_CORRESPONDING_FRAME_ID_MSG);
        self.pages[frame_id].write().unwrap().set_is_dirty(is_dirty);
    }
}
