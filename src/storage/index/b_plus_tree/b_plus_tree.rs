use crate::common::constants::{HEADER_PAGE_ID, INVALID_PID, PAGE_SIZE};
use crate::common::transaction::Transaction;
use crate::common::{Error, Result};
use crate::storage::buffer::buffer_pool_manager::{BufferPoolManager, PageGuard};
use crate::storage::disk::disk_manager::PageId;
use crate::storage::index::index_iterator::IndexIterator;
use crate::storage::page::{
    BPlusTreeInternalPage, BPlusTreeLeafPage, BTreePage, HeaderPage, IndexKey, RecordId,
    INTERNAL_PAGE_HEADER_SIZE, LEAF_PAGE_HEADER_SIZE,
};
use itertools::Itertools;
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// A unique-key B+ tree index over buffer-pool pages.
///
/// The tree only knows its root page id; every page it touches is pinned
/// through a [`PageGuard`] and released on scope exit, which keeps the
/// pinned working set at no more than two frames even while splitting or
/// merging. Changes to the root are persisted in the header page under
/// `index_name` right away, so a tree can be reopened by name.
#[derive(Debug)]
pub struct BPlusTree<K> {
    index_name: String,
    root_page_id: PageId,
    buffer_pool_manager: Arc<RwLock<BufferPoolManager>>,
    leaf_max_size: u32,
    internal_max_size: u32,
    _marker: PhantomData<K>,
}

impl<K: IndexKey> BPlusTree<K> {
    /// Opens (or creates) the index named `index_name`, restoring a
    /// persisted root page id from the header page if one exists. Page
    /// capacities derive from `PAGE_SIZE` and the key/value sizes.
    pub fn new(index_name: &str, buffer_pool_manager: Arc<RwLock<BufferPoolManager>>) -> Result<Self> {
        let leaf_max_size =
            ((PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / (size_of::<K>() + size_of::<RecordId>())) as u32;
        let internal_max_size =
            ((PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / (size_of::<K>() + size_of::<PageId>())) as u32;
        Self::with_max_sizes(index_name, buffer_pool_manager, leaf_max_size, internal_max_size)
    }

    /// Like [`BPlusTree::new`] but with explicit page capacities. Small
    /// capacities make split and merge behavior easy to exercise.
    pub fn with_max_sizes(
        index_name: &str,
        buffer_pool_manager: Arc<RwLock<BufferPoolManager>>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        assert!(leaf_max_size >= 2 && internal_max_size >= 3, "tree pages this small cannot split");
        let mut tree = Self {
            index_name: index_name.to_owned(),
            root_page_id: INVALID_PID,
            buffer_pool_manager,
            leaf_max_size,
            internal_max_size,
            _marker: PhantomData,
        };
        tree.root_page_id = tree.load_root_page_id()?;
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Point query.
    ///
    /// # Returns
    /// - the record id stored under `key`, or `None` if the key is absent
    pub fn get_value(&self, key: &K, _transaction: &Transaction) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (_guard, leaf) = self.find_leaf_page(Some(key))?;
        Ok(leaf.lookup(key))
    }

    /// Inserts `key -> value`, splitting pages as needed.
    ///
    /// # Returns
    /// - `Ok(false)` if the key already exists (unique index; the tree is
    ///   unchanged)
    pub fn insert(&mut self, key: K, value: RecordId, _transaction: &Transaction) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }
        self.insert_into_leaf(key, value)
    }

    /// Removes `key` if present. Underfull pages borrow from or merge with
    /// a sibling; merges can propagate up to the root.
    pub fn remove(&mut self, key: &K, _transaction: &Transaction) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let (leaf_id, new_size, min_size) = {
            let (mut guard, mut leaf) = self.find_leaf_page(Some(key))?;
            let old_size = leaf.size();
            let new_size = leaf.remove_record(key);
            if new_size == old_size {
                return Ok(());
            }
            write_leaf(&mut guard, &leaf)?;
            (leaf.page_id(), new_size, leaf.min_size())
        };
        if new_size < min_size {
            self.coalesce_or_redistribute(leaf_id)?;
        }
        Ok(())
    }

    /// Iterator over the whole index in ascending key order.
    pub fn iter(&self) -> Result<IndexIterator<K>> {
        if self.is_empty() {
            return Ok(IndexIterator::empty(Arc::clone(&self.buffer_pool_manager)));
        }
        let (guard, leaf) = self.find_leaf_page(None)?;
        Ok(IndexIterator::new(
            Arc::clone(&self.buffer_pool_manager),
            guard,
            leaf,
            0,
        ))
    }

    /// Iterator positioned at the first entry with key `>= key`.
    pub fn iter_from(&self, key: &K) -> Result<IndexIterator<K>> {
        if self.is_empty() {
            return Ok(IndexIterator::empty(Arc::clone(&self.buffer_pool_manager)));
        }
        let (guard, leaf) = self.find_leaf_page(Some(key))?;
        let index = leaf.key_index(key);
        Ok(IndexIterator::new(
            Arc::clone(&self.buffer_pool_manager),
            guard,
            leaf,
            index,
        ))
    }

    /// Renders the tree level by level for debugging.
    pub fn tree_string(&self) -> Result<String> {
        if self.is_empty() {
            return Ok("Empty tree".to_owned());
        }
        let mut lines = Vec::new();
        let mut level = vec![self.root_page_id];
        while !level.is_empty() {
            let mut next_level = Vec::new();
            let mut rendered = Vec::new();
            for page_id in &level {
                let node = {
                    let guard = PageGuard::fetch(&self.buffer_pool_manager, *page_id)?;
                    read_node::<K>(&guard)?
                };
                match node {
                    BTreePage::Leaf(leaf) => rendered.push(format!(
                        "[{}]",
                        leaf.entries().iter().map(|(k, _)| format!("{k:?}")).join(" ")
                    )),
                    BTreePage::Internal(internal) => {
                        rendered.push(format!(
                            "[{}]",
                            (1..internal.size())
                                .map(|i| format!("{:?}", internal.key_at(i)))
                                .join(" ")
                        ));
                        next_level.extend(internal.child_ids());
                    }
                }
            }
            lines.push(rendered.join(" "));
            level = next_level;
        }
        Ok(lines.join("\n"))
    }

    /*
     * Descent
     */

    /// Descends to the leaf that owns `target`, or to the leftmost leaf when
    /// `target` is `None`. Each internal page is unpinned before its child
    /// is fetched, so the descent holds one pin at a time. The returned leaf
    /// stays pinned through the guard.
    fn find_leaf_page(&self, target: Option<&K>) -> Result<(PageGuard, BPlusTreeLeafPage<K>)> {
        debug_assert!(!self.is_empty());
        let mut guard = PageGuard::fetch(&self.buffer_pool_manager, self.root_page_id)?;
        loop {
            match read_node::<K>(&guard)? {
                BTreePage::Leaf(leaf) => return Ok((guard, leaf)),
                BTreePage::Internal(internal) => {
                    let child_id = match target {
                        Some(key) => internal.lookup(key),
                        None => internal.value_at(0),
                    };
                    drop(guard);
                    guard = PageGuard::fetch(&self.buffer_pool_manager, child_id)?;
                }
            }
        }
    }

    /*
     * Insertion
     */

    fn start_new_tree(&mut self, key: K, value: RecordId) -> Result<()> {
        let mut guard = PageGuard::allocate(&self.buffer_pool_manager)?;
        let root_page_id = guard.page_id();
        let mut root = BPlusTreeLeafPage::new(root_page_id, INVALID_PID, self.leaf_max_size);
        root.insert(key, value);
        write_leaf(&mut guard, &root)?;
        drop(guard);

        self.root_page_id = root_page_id;
        self.update_root_page_id()?;
        log::debug!("index `{}` started at root page {root_page_id}", self.index_name);
        Ok(())
    }

    fn insert_into_leaf(&mut self, key: K, value: RecordId) -> Result<bool> {
        let (mut guard, mut leaf) = self.find_leaf_page(Some(&key))?;
        if leaf.lookup(&key).is_some() {
            return Ok(false);
        }
        if leaf.size() < leaf.max_size() {
            leaf.insert(key, value);
            write_leaf(&mut guard, &leaf)?;
            return Ok(true);
        }

        // Full leaf: move the upper half out, then place the pending entry
        // on whichever side owns it.
        let mut sibling_guard = PageGuard::allocate(&self.buffer_pool_manager)?;
        let sibling_id = sibling_guard.page_id();
        let mut sibling =
            BPlusTreeLeafPage::new(sibling_id, leaf.parent_page_id(), self.leaf_max_size);
        leaf.move_half_to(&mut sibling);
        sibling.set_next_page_id(leaf.next_page_id());
        leaf.set_next_page_id(sibling_id);
        if key < *sibling.key_at(0) {
            leaf.insert(key, value);
        } else {
            sibling.insert(key, value);
        }

        let separator = sibling.key_at(0).clone();
        let left_id = leaf.page_id();
        let parent_id = leaf.parent_page_id();
        write_leaf(&mut guard, &leaf)?;
        write_leaf(&mut sibling_guard, &sibling)?;
        drop(guard);
        drop(sibling_guard);

        log::debug!("split leaf {left_id}, new sibling {sibling_id}");
        self.insert_into_parent(left_id, parent_id, separator, sibling_id)?;
        Ok(true)
    }

    /// Hooks `right_id` into the parent of `left_id`, splitting ancestors as
    /// needed. `parent_id == INVALID_PID` means `left_id` was the root.
    fn insert_into_parent(
        &mut self,
        left_id: PageId,
        parent_id: PageId,
        key: K,
        right_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PID {
            let mut root_guard = PageGuard::allocate(&self.buffer_pool_manager)?;
            let new_root_id = root_guard.page_id();
            let mut root =
                BPlusTreeInternalPage::new(new_root_id, INVALID_PID, self.internal_max_size);
            root.populate_new_root(left_id, key, right_id);
            write_internal(&mut root_guard, &root)?;
            drop(root_guard);

            self.root_page_id = new_root_id;
            self.update_root_page_id()?;
            self.set_parent(left_id, new_root_id)?;
            self.set_parent(right_id, new_root_id)?;
            log::debug!("grew index `{}` to new root {new_root_id}", self.index_name);
            return Ok(());
        }

        let mut parent_guard = PageGuard::fetch(&self.buffer_pool_manager, parent_id)?;
        let mut parent = read_internal::<K>(&parent_guard)?;
        if parent.size() < parent.max_size() {
            parent.insert_node_after(left_id, key, right_id);
            write_internal(&mut parent_guard, &parent)?;
            return Ok(());
        }

        // Full parent: link the new child first, then split the oversized
        // page. The extra entry only ever lives in memory.
        parent.insert_node_after(left_id, key, right_id);
        let mut sibling_guard = PageGuard::allocate(&self.buffer_pool_manager)?;
        let sibling_id = sibling_guard.page_id();
        let mut sibling =
            BPlusTreeInternalPage::new(sibling_id, parent.parent_page_id(), self.internal_max_size);
        let push_key = parent.move_half_to(&mut sibling);
        let grandparent_id = parent.parent_page_id();
        let moved_children: Vec<PageId> = sibling.child_ids().collect();
        write_internal(&mut parent_guard, &parent)?;
        write_internal(&mut sibling_guard, &sibling)?;
        drop(parent_guard);
        drop(sibling_guard);

        for child_id in moved_children {
            self.set_parent(child_id, sibling_id)?;
        }
        log::debug!("split internal {parent_id}, new sibling {sibling_id}");
        self.insert_into_parent(parent_id, grandparent_id, push_key, sibling_id)
    }

    /*
     * Deletion
     */

    /// Restores the fill invariant of an underfull page by borrowing from a
    /// sibling or merging into the lower-indexed one of the pair, recursing
    /// on the parent when the separator removal leaves it underfull.
    fn coalesce_or_redistribute(&mut self, page_id: PageId) -> Result<()> {
        if page_id == self.root_page_id {
            return self.adjust_root();
        }

        let (parent_id, node_is_leaf) = {
            let guard = PageGuard::fetch(&self.buffer_pool_manager, page_id)?;
            let node = read_node::<K>(&guard)?;
            (node.parent_page_id(), node.is_leaf())
        };
        // Prefer the left sibling; only the leftmost child pairs rightward.
        let (node_index, sibling_id, separator_index, separator_key) = {
            let parent_guard = PageGuard::fetch(&self.buffer_pool_manager, parent_id)?;
            let parent = read_internal::<K>(&parent_guard)?;
            let node_index = parent
                .value_index(page_id)
                .expect("underfull page is missing from its parent");
            let separator_index = node_index.max(1);
            let sibling_index = if node_index > 0 { node_index - 1 } else { 1 };
            (
                node_index,
                parent.value_at(sibling_index),
                separator_index,
                parent.key_at(separator_index).clone(),
            )
        };

        if node_is_leaf {
            self.repair_leaf(page_id, parent_id, node_index, sibling_id, separator_index)
        } else {
            self.repair_internal(
                page_id,
                parent_id,
                node_index,
                sibling_id,
                separator_index,
                separator_key,
            )
        }
    }

    fn repair_leaf(
        &mut self,
        page_id: PageId,
        parent_id: PageId,
        node_index: usize,
        sibling_id: PageId,
        separator_index: usize,
    ) -> Result<()> {
        let mut sibling_guard = PageGuard::fetch(&self.buffer_pool_manager, sibling_id)?;
        let mut sibling = read_leaf::<K>(&sibling_guard)?;
        let mut node_guard = PageGuard::fetch(&self.buffer_pool_manager, page_id)?;
        let mut node = read_leaf::<K>(&node_guard)?;

        if sibling.size() > sibling.min_size() {
            let new_separator = if node_index > 0 {
                sibling.move_last_to_front_of(&mut node);
                node.key_at(0).clone()
            } else {
                sibling.move_first_to_end_of(&mut node);
                sibling.key_at(0).clone()
            };
            write_leaf(&mut sibling_guard, &sibling)?;
            write_leaf(&mut node_guard, &node)?;
            drop(sibling_guard);
            drop(node_guard);
            log::debug!("redistributed between leaves {sibling_id} and {page_id}");
            return self.set_separator(parent_id, separator_index, new_separator);
        }

        // Merge into the lower-indexed page of the pair.
        let (mut left_guard, mut left, right_guard, mut right, right_id) = if node_index > 0 {
            (sibling_guard, sibling, node_guard, node, page_id)
        } else {
            (node_guard, node, sibling_guard, sibling, sibling_id)
        };
        right.move_all_to(&mut left);
        write_leaf(&mut left_guard, &left)?;
        drop(left_guard);
        drop(right_guard);

        log::debug!("merged leaf {right_id} into {}", if node_index > 0 { sibling_id } else { page_id });
        self.delete_tree_page(right_id);
        self.remove_parent_entry(parent_id, separator_index)
    }

    fn repair_internal(
        &mut self,
        page_id: PageId,
        parent_id: PageId,
        node_index: usize,
        sibling_id: PageId,
        separator_index: usize,
        separator_key: K,
    ) -> Result<()> {
        let mut sibling_guard = PageGuard::fetch(&self.buffer_pool_manager, sibling_id)?;
        let mut sibling = read_internal::<K>(&sibling_guard)?;
        let mut node_guard = PageGuard::fetch(&self.buffer_pool_manager, page_id)?;
        let mut node = read_internal::<K>(&node_guard)?;

        if sibling.size() > sibling.min_size() {
            let (new_separator, moved_child) = if node_index > 0 {
                sibling.move_last_to_front_of(&mut node, separator_key)
            } else {
                sibling.move_first_to_end_of(&mut node, separator_key)
            };
            write_internal(&mut sibling_guard, &sibling)?;
            write_internal(&mut node_guard, &node)?;
            drop(sibling_guard);
            drop(node_guard);
            self.set_parent(moved_child, page_id)?;
            log::debug!("redistributed between internals {sibling_id} and {page_id}");
            return self.set_separator(parent_id, separator_index, new_separator);
        }

        let (mut left_guard, mut left, right_guard, mut right, left_id, right_id) =
            if node_index > 0 {
                (sibling_guard, sibling, node_guard, node, sibling_id, page_id)
            } else {
                (node_guard, node, sibling_guard, sibling, page_id, sibling_id)
            };
        let moved_children: Vec<PageId> = right.child_ids().collect();
        right.move_all_to(&mut left, separator_key);
        write_internal(&mut left_guard, &left)?;
        drop(left_guard);
        drop(right_guard);

        self.delete_tree_page(right_id);
        for child_id in moved_children {
            self.set_parent(child_id, left_id)?;
        }
        log::debug!("merged internal {right_id} into {left_id}");
        self.remove_parent_entry(parent_id, separator_index)
    }

    /// Drops the separator entry at `entry_index` from the parent after a
    /// merge and continues the repair upward if the parent underflowed.
    fn remove_parent_entry(&mut self, parent_id: PageId, entry_index: usize) -> Result<()> {
        let (parent_size, parent_min_size) = {
            let mut parent_guard = PageGuard::fetch(&self.buffer_pool_manager, parent_id)?;
            let mut parent = read_internal::<K>(&parent_guard)?;
            parent.remove(entry_index);
            write_internal(&mut parent_guard, &parent)?;
            (parent.size(), parent.min_size())
        };
        if parent_id == self.root_page_id {
            if parent_size == 1 {
                self.adjust_root()?;
            }
        } else if parent_size < parent_min_size {
            self.coalesce_or_redistribute(parent_id)?;
        }
        Ok(())
    }

    /// Shrinks the tree at the top: an empty leaf root empties the tree, an
    /// internal root with a single child hands the root role to that child.
    fn adjust_root(&mut self) -> Result<()> {
        let old_root_id = self.root_page_id;
        let root = {
            let guard = PageGuard::fetch(&self.buffer_pool_manager, old_root_id)?;
            read_node::<K>(&guard)?
        };
        match root {
            BTreePage::Leaf(leaf) => {
                if leaf.size() == 0 {
                    self.root_page_id = INVALID_PID;
                    self.update_root_page_id()?;
                    self.delete_tree_page(old_root_id);
                    log::debug!("index `{}` is now empty", self.index_name);
                }
            }
            BTreePage::Internal(mut internal) => {
                if internal.size() == 1 {
                    let child_id = internal.remove_and_return_only_child();
                    self.root_page_id = child_id;
                    self.update_root_page_id()?;
                    self.set_parent(child_id, INVALID_PID)?;
                    self.delete_tree_page(old_root_id);
                    log::debug!("index `{}` shrank to root {child_id}", self.index_name);
                }
            }
        }
        Ok(())
    }

    /*
     * Header page bookkeeping
     */

    fn load_root_page_id(&self) -> Result<PageId> {
        let guard = PageGuard::fetch(&self.buffer_pool_manager, HEADER_PAGE_ID)?;
        let header = HeaderPage::from_page(&guard.page().read().unwrap())?;
        Ok(header.get_root_id(&self.index_name).unwrap_or(INVALID_PID))
    }

    /// Persists the current root page id under the index name, creating the
    /// header record on first use.
    fn update_root_page_id(&self) -> Result<()> {
        let mut guard = PageGuard::fetch(&self.buffer_pool_manager, HEADER_PAGE_ID)?;
        let mut header = HeaderPage::from_page(&guard.page().read().unwrap())?;
        if !header.update_record(&self.index_name, self.root_page_id)
            && !header.insert_record(&self.index_name, self.root_page_id)
        {
            return Err(Error::InvalidInput(format!(
                "header page cannot record index `{}`",
                self.index_name
            )));
        }
        {
            let mut page = guard.page().write().unwrap();
            header.write_to(&mut page)?;
        }
        guard.mark_dirty();
        Ok(())
    }

    /*
     * Shared helpers
     */

    fn set_parent(&self, page_id: PageId, parent_page_id: PageId) -> Result<()> {
        let mut guard = PageGuard::fetch(&self.buffer_pool_manager, page_id)?;
        let mut node = read_node::<K>(&guard)?;
        node.set_parent_page_id(parent_page_id);
        {
            let mut page = guard.page().write().unwrap();
            node.write_to(&mut page)?;
        }
        guard.mark_dirty();
        Ok(())
    }

    fn set_separator(&mut self, parent_id: PageId, index: usize, key: K) -> Result<()> {
        let mut parent_guard = PageGuard::fetch(&self.buffer_pool_manager, parent_id)?;
        let mut parent = read_internal::<K>(&parent_guard)?;
        parent.set_key_at(index, key);
        write_internal(&mut parent_guard, &parent)
    }

    /// The page is expected to be unpinned by the time this runs; a failure
    /// here means a guard leaked somewhere.
    fn delete_tree_page(&self, page_id: PageId) {
        if !self
            .buffer_pool_manager
            .write()
            .unwrap()
            .delete_page(page_id)
        {
            log::warn!(
                "index `{}` could not delete page {page_id}",
                self.index_name
            );
        }
    }
}

impl BPlusTree<i64> {
    /// Reads whitespace-separated i64 keys from `path` and inserts each with
    /// a record id derived from the key. Test convenience, not a product
    /// interface.
    pub fn insert_from_file(
        &mut self,
        path: impl AsRef<Path>,
        transaction: &Transaction,
    ) -> Result<()> {
        for key in read_keys_from_file(path)? {
            let record_id = RecordId::new((key >> 32) as PageId, key as u32);
            self.insert(key, record_id, transaction)?;
        }
        Ok(())
    }

    /// Counterpart of [`BPlusTree::insert_from_file`].
    pub fn remove_from_file(
        &mut self,
        path: impl AsRef<Path>,
        transaction: &Transaction,
    ) -> Result<()> {
        for key in read_keys_from_file(path)? {
            self.remove(&key, transaction)?;
        }
        Ok(())
    }
}

fn read_keys_from_file(path: impl AsRef<Path>) -> Result<Vec<i64>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .split_whitespace()
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| Error::InvalidInput(format!("invalid key `{token}`")))
        })
        .collect()
}

pub(crate) fn read_node<K: IndexKey>(guard: &PageGuard) -> Result<BTreePage<K>> {
    let page = guard.page().read().unwrap();
    BTreePage::from_page(&page)
}

pub(crate) fn read_leaf<K: IndexKey>(guard: &PageGuard) -> Result<BPlusTreeLeafPage<K>> {
    match read_node::<K>(guard)? {
        BTreePage::Leaf(leaf) => Ok(leaf),
        BTreePage::Internal(internal) => Err(Error::CorruptedPage(
            internal.page_id(),
            "expected a leaf page".to_owned(),
        )),
    }
}

fn read_internal<K: IndexKey>(guard: &PageGuard) -> Result<BPlusTreeInternalPage<K>> {
    match read_node::<K>(guard)? {
        BTreePage::Internal(internal) => Ok(internal),
        BTreePage::Leaf(leaf) => Err(Error::CorruptedPage(
            leaf.page_id(),
            "expected an internal page".to_owned(),
        )),
    }
}

fn write_leaf<K: IndexKey>(guard: &mut PageGuard, leaf: &BPlusTreeLeafPage<K>) -> Result<()> {
    {
        let mut page = guard.page().write().unwrap();
        leaf.write_to(&mut page)?;
    }
    guard.mark_dirty();
    Ok(())
}

fn write_internal<K: IndexKey>(
    guard: &mut PageGuard,
    internal: &BPlusTreeInternalPage<K>,
) -> Result<()> {
    {
        let mut page = guard.page().write().unwrap();
        internal.write_to(&mut page)?;
    }
    guard.mark_dirty();
    Ok(())
}
