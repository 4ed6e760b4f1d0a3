use crate::common::constants::{INVALID_PID, PAGE_SIZE};
use crate::common::{Error, Result};
use crate::storage::disk::disk_manager::PageId;
use crate::storage::page::{BPlusTreeInternalPage, BPlusTreeLeafPage, Page};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Bytes reserved at the front of a tree page for the type tag and header
/// fields when deriving entry capacities from `PAGE_SIZE`.
pub const LEAF_PAGE_HEADER_SIZE: usize = 64;
pub const INTERNAL_PAGE_HEADER_SIZE: usize = 64;

pub(super) const PAGE_TYPE_TAG_SIZE: usize = 4;
pub(super) const LEAF_PAGE_TAG: u32 = 1;
pub(super) const INTERNAL_PAGE_TAG: u32 = 2;

/// Capability bundle for index keys. `Ord` is the comparator; the remaining
/// bounds let keys live inside serialized pages. Fixed-size keys are
/// expected: derived page capacities assume the encoded width of a key is
/// `size_of::<K>()`.
pub trait IndexKey: Ord + Clone + Debug + Default + Serialize + DeserializeOwned {}

impl<T> IndexKey for T where T: Ord + Clone + Debug + Default + Serialize + DeserializeOwned {}

/// A validated, typed view of a raw tree-page frame.
///
/// The first four bytes of the frame carry the page type; construction fails
/// on an unknown tag rather than reinterpreting garbage.
#[derive(Debug, Clone)]
pub enum BTreePage<K> {
    Leaf(BPlusTreeLeafPage<K>),
    Internal(BPlusTreeInternalPage<K>),
}

impl<K: IndexKey> BTreePage<K> {
    pub fn from_page(page: &Page) -> Result<Self> {
        let data = page.data();
        let tag = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let body = &data[PAGE_TYPE_TAG_SIZE..];
        match tag {
            LEAF_PAGE_TAG => bincode::deserialize(body)
                .map(BTreePage::Leaf)
                .map_err(|err| Error::CorruptedPage(*page.page_id(), err.to_string())),
            INTERNAL_PAGE_TAG => bincode::deserialize(body)
                .map(BTreePage::Internal)
                .map_err(|err| Error::CorruptedPage(*page.page_id(), err.to_string())),
            other => Err(Error::CorruptedPage(
                *page.page_id(),
                format!("unknown page type tag {other}"),
            )),
        }
    }

    pub fn write_to(&self, page: &mut Page) -> Result<()> {
        match self {
            BTreePage::Leaf(leaf) => leaf.write_to(page),
            BTreePage::Internal(internal) => internal.write_to(page),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BTreePage::Leaf(_))
    }

    pub fn page_id(&self) -> PageId {
        match self {
            BTreePage::Leaf(leaf) => leaf.page_id(),
            BTreePage::Internal(internal) => internal.page_id(),
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        match self {
            BTreePage::Leaf(leaf) => leaf.parent_page_id(),
            BTreePage::Internal(internal) => internal.parent_page_id(),
        }
    }

    pub fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        match self {
            BTreePage::Leaf(leaf) => leaf.set_parent_page_id(parent_page_id),
            BTreePage::Internal(internal) => internal.set_parent_page_id(parent_page_id),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_page_id() == INVALID_PID
    }

    pub fn size(&self) -> usize {
        match self {
            BTreePage::Leaf(leaf) => leaf.size(),
            BTreePage::Internal(internal) => internal.size(),
        }
    }

    pub fn max_size(&self) -> usize {
        match self {
            BTreePage::Leaf(leaf) => leaf.max_size(),
            BTreePage::Internal(internal) => internal.max_size(),
        }
    }

    /// Lower fill bound for non-root pages.
    pub fn min_size(&self) -> usize {
        match self {
            BTreePage::Leaf(leaf) => leaf.min_size(),
            BTreePage::Internal(internal) => internal.min_size(),
        }
    }
}

/// Writes `tag` plus the bincode image of `body` into the frame, zeroing the
/// tail so stale bytes from an evicted page can never be decoded.
pub(super) fn write_tagged_page<T: Serialize>(page: &mut Page, tag: u32, body: &T) -> Result<()> {
    let encoded = bincode::serialize(body)?;
    if PAGE_TYPE_TAG_SIZE + encoded.len() > PAGE_SIZE {
        return Err(Error::PageOverflow(*page.page_id()));
    }
    let data = page.data_mut();
    data[..PAGE_TYPE_TAG_SIZE].copy_from_slice(&tag.to_le_bytes());
    data[PAGE_TYPE_TAG_SIZE..PAGE_TYPE_TAG_SIZE + encoded.len()].copy_from_slice(&encoded);
    data[PAGE_TYPE_TAG_SIZE + encoded.len()..].fill(0);
    Ok(())
}
