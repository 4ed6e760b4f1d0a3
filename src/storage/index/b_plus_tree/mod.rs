mod b_plus_tree;


pub use b_plus_tree::BPlusTree;
pub(crate) use b_plus_tree::{read_leaf, read_node};
