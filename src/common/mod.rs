pub mod constants;
pub mod transaction;

use crate::storage::disk::disk_manager::PageId;
use thiserror::Error;

/// Crate-wide error type. Soft misuse (unpinning an unpinned page, deleting
/// a pinned page) is reported through boolean returns instead; broken pin or
/// page-table invariants panic, since they indicate a bug rather than a
/// recoverable condition.
#[derive(Error, Debug)]
pub enum Error {
    /// Every frame in the buffer pool is pinned; no victim is available.
    #[error("buffer pool is full: all frames are pinned")]
    BufferPoolFull,

    /// The requested page is not resident in the buffer pool.
    #[error("page {0} is not in the buffer pool")]
    PageNotFound(PageId),

    /// An index was outside the bounds of the addressed structure.
    #[error("index out of bounds")]
    OutOfBounds,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The frame's bytes do not decode as the expected page kind.
    #[error("page {0} is corrupted: {1}")]
    CorruptedPage(PageId, String),

    /// A page image would not fit into `PAGE_SIZE` bytes.
    #[error("serialized page {0} exceeds the page size")]
    PageOverflow(PageId),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Asserts that a `Result`-returning expression fails.
#[macro_export]
macro_rules! assert_errors {
    ($expr:expr) => {
        assert!(($expr).is_err(), "expected `{}` to fail", stringify!($expr));
    };
}
