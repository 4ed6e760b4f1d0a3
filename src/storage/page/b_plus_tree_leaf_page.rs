use crate::common::constants::INVALID_PID;
use crate::common::Result;
use crate::storage::disk::disk_manager::PageId;
use crate::storage::page::b_plus_tree_page::{write_tagged_page, IndexKey, LEAF_PAGE_TAG};
use crate::storage::page::{Page, RecordId};
use serde::{Deserialize, Serialize};

/// A leaf page of the B+ tree: sorted `(key, RecordId)` entries plus the
/// link to the next leaf in ascending-key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BPlusTreeLeafPage<K> {
    page_id: PageId,
    parent_page_id: PageId,
    next_page_id: PageId,
    max_size: u32,
    entries: Vec<(K, RecordId)>,
}

impl<K: IndexKey> BPlusTreeLeafPage<K> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            page_id,
            parent_page_id,
            next_page_id: INVALID_PID,
            max_size,
            entries: Vec::new(),
        }
    }

    pub fn write_to(&self, page: &mut Page) -> Result<()> {
        write_tagged_page(page, LEAF_PAGE_TAG, self)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn parent_page_id(&self) -> PageId {
        self.parent_page_id
    }

    pub fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        self.parent_page_id = parent_page_id;
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.next_page_id = next_page_id;
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size as usize
    }

    pub fn min_size(&self) -> usize {
        self.max_size().div_ceil(2)
    }

    pub fn key_at(&self, index: usize) -> &K {
        &self.entries[index].0
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        self.entries[index].1
    }

    pub fn entry_at(&self, index: usize) -> &(K, RecordId) {
        &self.entries[index]
    }

    pub(crate) fn entries(&self) -> &[(K, RecordId)] {
        &self.entries
    }

    /// Smallest index whose key is `>= key`, or `size()` if every key is
    /// smaller.
    pub fn key_index(&self, key: &K) -> usize {
        self.entries.partition_point(|(k, _)| k < key)
    }

    pub fn lookup(&self, key: &K) -> Option<RecordId> {
        let index = self.key_index(key);
        match self.entries.get(index) {
            Some((k, value)) if k == key => Some(*value),
            _ => None,
        }
    }

    /// In-order insert; duplicates are a no-op since the index is unique.
    ///
    /// # Returns
    /// - the page size after the insertion
    pub fn insert(&mut self, key: K, value: RecordId) -> usize {
        let index = self.key_index(&key);
        let duplicate = matches!(self.entries.get(index), Some((k, _)) if *k == key);
        if !duplicate {
            self.entries.insert(index, (key, value));
        }
        self.entries.len()
    }

    /// Removes the entry for `key` if present, shifting the tail down.
    ///
    /// # Returns
    /// - the page size after the removal
    pub fn remove_record(&mut self, key: &K) -> usize {
        let index = self.key_index(key);
        if matches!(self.entries.get(index), Some((k, _)) if k == key) {
            self.entries.remove(index);
        }
        self.entries.len()
    }

    /// Moves the upper `size / 2` entries into an empty right sibling. The
    /// caller relinks the leaf chain.
    pub fn move_half_to(&mut self, recipient: &mut Self) {
        debug_assert!(recipient.entries.is_empty());
        let moved = self.entries.len() / 2;
        recipient
            .entries
            .extend(self.entries.drain(self.entries.len() - moved..));
    }

    /// Appends every entry to `recipient` (the left neighbor) and hands over
    /// the leaf-chain link.
    pub fn move_all_to(&mut self, recipient: &mut Self) {
        recipient.entries.append(&mut self.entries);
        recipient.next_page_id = self.next_page_id;
    }

    /// Moves this page's first entry to the end of `recipient` (the left
    /// neighbor). The caller refreshes the separator key in the parent to
    /// this page's new first key.
    pub fn move_first_to_end_of(&mut self, recipient: &mut Self) {
        let first = self.entries.remove(0);
        recipient.entries.push(first);
    }

    /// Moves this page's last entry to the front of `recipient` (the right
    /// neighbor). The caller refreshes the separator key in the parent to
    /// the moved key.
    pub fn move_last_to_front_of(&mut self, recipient: &mut Self) {
        let last = self
            .entries
            .pop()
            .expect("cannot redistribute from an empty leaf");
        recipient.entries.insert(0, last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with_keys(keys: &[i64]) -> BPlusTreeLeafPage<i64> {
        let mut leaf = BPlusTreeLeafPage::new(2, INVALID_PID, 8);
        for &key in keys {
            leaf.insert(key, RecordId::new(2, key as u32));
        }
        leaf
    }

    #[test]
    fn test_insert_keeps_order_and_ignores_duplicates() {
        let mut leaf = leaf_with_keys(&[30, 10, 20]);
        assert_eq!(leaf.size(), 3);
        assert_eq!(*leaf.key_at(0), 10);
        assert_eq!(*leaf.key_at(2), 30);

        assert_eq!(leaf.insert(20, RecordId::new(9, 9)), 3);
        assert_eq!(leaf.lookup(&20), Some(RecordId::new(2, 20)));
        assert_eq!(leaf.value_at(1), RecordId::new(2, 20));
    }

    #[test]
    fn test_key_index_boundaries() {
        let leaf = leaf_with_keys(&[10, 20, 30]);
        assert_eq!(leaf.key_index(&5), 0);
        assert_eq!(leaf.key_index(&20), 1);
        assert_eq!(leaf.key_index(&25), 2);
        assert_eq!(leaf.key_index(&35), 3);
    }

    #[test]
    fn test_remove_record_shifts_tail() {
        let mut leaf = leaf_with_keys(&[10, 20, 30]);
        assert_eq!(leaf.remove_record(&20), 2);
        assert_eq!(leaf.remove_record(&20), 2);
        assert_eq!(*leaf.key_at(1), 30);
    }

    #[test]
    fn test_move_half_to_splits_high_half() {
        let mut leaf = leaf_with_keys(&[1, 2, 3, 4]);
        let mut sibling = BPlusTreeLeafPage::new(3, INVALID_PID, 8);
        leaf.move_half_to(&mut sibling);
        assert_eq!(leaf.size(), 2);
        assert_eq!(sibling.size(), 2);
        assert_eq!(*sibling.key_at(0), 3);
    }

    #[test]
    fn test_move_all_to_takes_over_chain_link() {
        let mut left = leaf_with_keys(&[1, 2]);
        let mut right = leaf_with_keys(&[3, 4]);
        right.set_next_page_id(77);
        right.move_all_to(&mut left);
        assert_eq!(left.size(), 4);
        assert_eq!(right.size(), 0);
        assert_eq!(left.next_page_id(), 77);
    }

    #[test]
    fn test_serialization_round_trip() {
        let leaf = leaf_with_keys(&[5, 6, 7]);
        let mut page = Page::new_invalid();
        leaf.write_to(&mut page).unwrap();

        use crate::storage::page::BTreePage;
        match BTreePage::<i64>::from_page(&page).unwrap() {
            BTreePage::Leaf(decoded) => {
                assert_eq!(decoded.size(), 3);
                assert_eq!(decoded.lookup(&6), Some(RecordId::new(2, 6)));
            }
            BTreePage::Internal(_) => panic!("decoded the wrong page kind"),
        }
    }
}
