mod index_iterator;

pub use index_iterator::IndexIterator;
