use crate::common::constants::PAGE_SIZE;
use crate::common::{Error, Result};
use crate::storage::disk::disk_manager::PageId;
use crate::storage::page::Page;
use serde::{Deserialize, Serialize};

pub const MAX_INDEX_NAME_LEN: usize = 32;
pub const MAX_HEADER_RECORDS: usize = 64;

/// The record store kept on page 0 of the database file.
///
/// It maps index names to their root page ids so that indexes survive a
/// restart. The on-disk layout is a bincode-encoded record vector (a u64
/// record count followed by length-prefixed names and little-endian root
/// ids); a zeroed page decodes as the empty record set, so a fresh database
/// file needs no explicit initialization.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HeaderPage {
    records: Vec<HeaderRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeaderRecord {
    name: String,
    root_page_id: PageId,
}

impl HeaderPage {
    pub fn from_page(page: &Page) -> Result<Self> {
        bincode::deserialize(page.data().as_slice())
            .map_err(|err| Error::CorruptedPage(*page.page_id(), err.to_string()))
    }

    pub fn write_to(&self, page: &mut Page) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        if encoded.len() > PAGE_SIZE {
            return Err(Error::PageOverflow(*page.page_id()));
        }
        let data = page.data_mut();
        data[..encoded.len()].copy_from_slice(&encoded);
        data[encoded.len()..].fill(0);
        Ok(())
    }

    /// # Returns
    /// - `false` if a record with this name already exists, the name is too
    ///   long, or the page is full
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        if name.len() > MAX_INDEX_NAME_LEN
            || self.records.len() >= MAX_HEADER_RECORDS
            || self.find(name).is_some()
        {
            return false;
        }
        self.records.push(HeaderRecord {
            name: name.to_owned(),
            root_page_id,
        });
        true
    }

    /// # Returns
    /// - `false` if no record with this name exists
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match self.find(name) {
            Some(index) => {
                self.records[index].root_page_id = root_page_id;
                true
            }
            None => false,
        }
    }

    /// # Returns
    /// - `false` if no record with this name exists
    pub fn delete_record(&mut self, name: &str) -> bool {
        match self.find(name) {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find(name).map(|index| self.records[index].root_page_id)
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|record| record.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::HEADER_PAGE_ID;

    fn header_page_frame() -> Page {
        let mut page = Page::new_invalid();
        page.page_id = HEADER_PAGE_ID;
        page
    }

    #[test]
    fn test_zeroed_page_decodes_as_empty() {
        let page = header_page_frame();
        let header = HeaderPage::from_page(&page).unwrap();
        assert_eq!(header.num_records(), 0);
    }

    #[test]
    fn test_record_crud_round_trip() {
        let mut page = header_page_frame();
        let mut header = HeaderPage::from_page(&page).unwrap();

        assert!(header.insert_record("orders_pk", 7));
        assert!(!header.insert_record("orders_pk", 9));
        assert!(header.update_record("orders_pk", 9));
        assert!(!header.update_record("missing", 1));
        header.write_to(&mut page).unwrap();

        let mut reloaded = HeaderPage::from_page(&page).unwrap();
        assert_eq!(reloaded.get_root_id("orders_pk"), Some(9));
        assert_eq!(reloaded.get_root_id("missing"), None);

        assert!(reloaded.delete_record("orders_pk"));
        assert!(!reloaded.delete_record("orders_pk"));
        assert_eq!(reloaded.num_records(), 0);
    }

    #[test]
    fn test_capacity_limits() {
        let mut header = HeaderPage::default();
        let long_name = "n".repeat(MAX_INDEX_NAME_LEN + 1);
        assert!(!header.insert_record(&long_name, 1));

        for i in 0..MAX_HEADER_RECORDS {
            assert!(header.insert_record(&format!("index_{i}"), i as PageId));
        }
        assert!(!header.insert_record("one_too_many", 1));
    }
}
