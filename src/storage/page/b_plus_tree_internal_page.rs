use crate::common::Result;
use crate::storage::disk::disk_manager::PageId;
use crate::storage::page::b_plus_tree_page::{write_tagged_page, IndexKey, INTERNAL_PAGE_TAG};
use crate::storage::page::Page;
use serde::{Deserialize, Serialize};

/// An internal page of the B+ tree.
///
/// `entries[i]` pairs a key with the child holding keys in
/// `[key[i], key[i+1])`; the key of `entries[0]` is an unused placeholder,
/// so `entries[0].1` is the child for everything below `key[1]`. The number
/// of children equals `size()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BPlusTreeInternalPage<K> {
    page_id: PageId,
    parent_page_id: PageId,
    max_size: u32,
    entries: Vec<(K, PageId)>,
}

impl<K: IndexKey> BPlusTreeInternalPage<K> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            page_id,
            parent_page_id,
            max_size,
            entries: Vec::new(),
        }
    }

    pub fn write_to(&self, page: &mut Page) -> Result<()> {
        write_tagged_page(page, INTERNAL_PAGE_TAG, self)
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

    pub fn set_key_at(&mut self, index: usize, key: K) {
        self.entries[index].0 = key;
    }

    pub fn value_at(&self, index: usize) -> PageId {
        self.entries[index].1
    }

    pub fn set_value_at(&mut self, index: usize, value: PageId) {
        self.entries[index].1 = value;
    }

    pub fn value_index(&self, value: PageId) -> Option<usize> {
        self.entries.iter().position(|(_, child)| *child == value)
    }

    pub fn child_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries.iter().map(|(_, child)| *child)
    }

    /// Child whose key range contains `key`. Keys are consulted from index 1
    /// on; the placeholder key of entry 0 never participates.
    pub fn lookup(&self, key: &K) -> PageId {
        let index = self.entries[1..].partition_point(|(k, _)| k <= key);
        self.entries[index].1
    }

    /// Turns an empty page into a root with two children. Only called when
    /// an overflow propagated all the way up.
    pub fn populate_new_root(&mut self, old_value: PageId, new_key: K, new_value: PageId) {
        debug_assert!(self.entries.is_empty());
        self.entries.push((K::default(), old_value));
        self.entries.push((new_key, new_value));
    }

    /// Inserts `(new_key, new_value)` immediately after the entry whose
    /// child is `old_value`.
    ///
    /// # Returns
    /// - the page size after the insertion
    pub fn insert_node_after(&mut self, old_value: PageId, new_key: K, new_value: PageId) -> usize {
        let index = self
            .value_index(old_value)
            .expect("split child is not present in its parent");
        self.entries.insert(index + 1, (new_key, new_value));
        self.entries.len()
    }

    pub fn remove(&mut self, index: usize) {
        self.entries.remove(index);
    }

    /// Drains the single remaining child. Only called from root adjustment.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        debug_assert_eq!(self.entries.len(), 1);
        let (_, child) = self
            .entries
            .pop()
            .expect("root adjustment on an empty internal page");
        child
    }

    /// Moves the upper half into an empty right sibling and yields the
    /// median key to push into the parent. May be called with one entry over
    /// `max_size`; the oversized state only ever exists in memory.
    pub fn move_half_to(&mut self, recipient: &mut Self) -> K {
        debug_assert!(recipient.entries.is_empty());
        let split_at = self.entries.len() / 2;
        let mut high = self.entries.split_off(split_at);
        let push_key = std::mem::take(&mut high[0].0);
        recipient.entries = high;
        push_key
    }

    /// Appends every entry to `recipient` (the left neighbor). The
    /// placeholder key of entry 0 is replaced by the separator taken from
    /// the parent so the merged key range stays contiguous.
    pub fn move_all_to(&mut self, recipient: &mut Self, separator_key: K) {
        self.entries[0].0 = separator_key;
        recipient.entries.append(&mut self.entries);
    }

    /// Moves this page's first child to the end of `recipient` (the left
    /// neighbor), keyed by the parent separator.
    ///
    /// # Returns
    /// - the key to install as the new parent separator, and the moved child
    pub fn move_first_to_end_of(&mut self, recipient: &mut Self, separator_key: K) -> (K, PageId) {
        let (_, first_child) = self.entries.remove(0);
        recipient.entries.push((separator_key, first_child));
        let new_separator = std::mem::take(&mut self.entries[0].0);
        (new_separator, first_child)
    }

    /// Moves this page's last child to the front of `recipient` (the right
    /// neighbor), pushing the parent separator down onto the displaced
    /// placeholder slot.
    ///
    /// # Returns
    /// - the key to install as the new parent separator, and the moved child
    pub fn move_last_to_front_of(&mut self, recipient: &mut Self, separator_key: K) -> (K, PageId) {
        let (last_key, last_child) = self
            .entries
            .pop()
            .expect("cannot redistribute from an empty internal page");
        recipient.entries[0].0 = separator_key;
        recipient.entries.insert(0, (K::default(), last_child));
        (last_key, last_child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::INVALID_PID;

    fn internal_with_children(keys: &[i64], children: &[PageId]) -> BPlusTreeInternalPage<i64> {
        assert_eq!(keys.len() + 1, children.len());
        let mut page = BPlusTreeInternalPage::new(1, INVALID_PID, 8);
        page.populate_new_root(children[0], keys[0], children[1]);
        for i in 1..keys.len() {
            page.insert_node_after(children[i], keys[i], children[i + 1]);
        }
        page
    }

    #[test]
    fn test_lookup_routes_by_key_range() {
        let page = internal_with_children(&[10, 20], &[100, 200, 300]);
        assert_eq!(page.lookup(&5), 100);
        assert_eq!(page.lookup(&10), 200);
        assert_eq!(page.lookup(&15), 200);
        assert_eq!(page.lookup(&25), 300);
    }

    #[test]
    fn test_insert_node_after_keeps_child_order() {
        let mut page = internal_with_children(&[10], &[100, 200]);
        page.insert_node_after(100, 5, 150);
        assert_eq!(page.size(), 3);
        assert_eq!(page.value_at(1), 150);
        assert_eq!(page.value_index(200), Some(2));
        assert_eq!(page.value_index(999), None);

        page.set_value_at(1, 175);
        assert_eq!(page.value_index(175), Some(1));
    }

    #[test]
    fn test_move_half_to_pushes_median() {
        let mut page = internal_with_children(&[10, 20, 30, 40], &[1, 2, 3, 4, 5]);
        let mut sibling = BPlusTreeInternalPage::new(9, INVALID_PID, 8);
        let median = page.move_half_to(&mut sibling);
        assert_eq!(median, 20);
        assert_eq!(page.size(), 2);
        assert_eq!(sibling.size(), 3);
        assert_eq!(sibling.value_at(0), 3);
        assert_eq!(*sibling.key_at(1), 30);
    }

    #[test]
    fn test_redistribution_moves() {
        // Borrow from the right sibling.
        let mut node = internal_with_children(&[10], &[1, 2]);
        let mut right = internal_with_children(&[30, 40], &[3, 4, 5]);
        let (new_sep, moved) = right.move_first_to_end_of(&mut node, 20);
        assert_eq!((new_sep, moved), (30, 3));
        assert_eq!(node.size(), 3);
        assert_eq!(*node.key_at(2), 20);

        // Borrow from the left sibling.
        let mut left = internal_with_children(&[10, 20], &[1, 2, 3]);
        let mut node = internal_with_children(&[40], &[4, 5]);
        let (new_sep, moved) = left.move_last_to_front_of(&mut node, 30);
        assert_eq!((new_sep, moved), (20, 3));
        assert_eq!(node.value_at(0), 3);
        assert_eq!(*node.key_at(1), 30);
    }

    #[test]
    fn test_move_all_to_installs_separator() {
        let mut left = internal_with_children(&[10], &[1, 2]);
        let mut node = internal_with_children(&[30], &[3, 4]);
        node.move_all_to(&mut left, 20);
        assert_eq!(left.size(), 4);
        assert_eq!(*left.key_at(2), 20);
        assert_eq!(left.value_at(2), 3);
    }
}
