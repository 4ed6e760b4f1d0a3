use crate::common::constants::PAGE_SIZE;
use crate::common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub type PageId = i32;

/// Reads and writes fixed-size pages of the database file and hands out
/// fresh page ids.
///
/// The file is a flat sequence of `PAGE_SIZE` frames indexed by page id.
/// Page 0 is reserved for the header page and is never returned by
/// [`DiskManager::allocate_page`]. All I/O is synchronous and page-granular;
/// errors from the filesystem propagate to the caller unchanged.
#[derive(Debug)]
pub struct DiskManager {
    db_file: File,
    file_path: Option<PathBuf>,
    next_page_id: PageId,
}

impl DiskManager {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let next_page_id = Self::first_free_page_id(&db_file)?;
        Ok(Self {
            db_file,
            file_path: Some(path.as_ref().to_path_buf()),
            next_page_id,
        })
    }

    pub fn new_with_handle(path: impl AsRef<Path>) -> Result<Arc<RwLock<Self>>> {
        Ok(Arc::new(RwLock::new(Self::new(path)?)))
    }

    /// Backs the manager with an anonymous temporary file that disappears
    /// when the manager is dropped.
    pub fn new_for_test() -> Self {
        let db_file = tempfile::tempfile().expect("Failed to create a temp database file.");
        Self {
            db_file,
            file_path: None,
            next_page_id: 1,
        }
    }

    pub fn new_with_handle_for_test() -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self::new_for_test()))
    }

    /// Page 0 is the header page; allocation resumes after the last page the
    /// file already contains.
    fn first_free_page_id(db_file: &File) -> Result<PageId> {
        let len = db_file.metadata()?.len();
        let pages_on_disk = (len as usize).div_ceil(PAGE_SIZE) as PageId;
        Ok(pages_on_disk.max(1))
    }

    /// # Returns
    /// - a fresh page id, strictly increasing over the lifetime of the file
    pub fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        log::trace!("allocated page {page_id}");
        page_id
    }

    /// Ids are not recycled; the page simply becomes garbage until the file
    /// is compacted offline.
    pub fn deallocate_page(&mut self, page_id: PageId) {
        log::trace!("deallocated page {page_id}");
    }

    /// Reads the page into `buf`. Reading a page that was never written
    /// (or only partially covered by the file) yields zero bytes for the
    /// missing tail.
    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let offset = Self::page_offset(page_id)?;
        self.db_file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < PAGE_SIZE {
            match self.db_file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = Self::page_offset(page_id)?;
        self.db_file.seek(SeekFrom::Start(offset))?;
        self.db_file.write_all(data)?;
        self.db_file.flush()?;
        Ok(())
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn page_offset(page_id: PageId) -> Result<u64> {
        if page_id < 0 {
            return Err(Error::InvalidInput(format!(
                "cannot address page {page_id}"
            )));
        }
        Ok(page_id as u64 * PAGE_SIZE as u64)
    }
}
