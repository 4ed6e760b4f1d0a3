mod extendible_hash_table;

#[cfg(test)]
mod tests;

pub use extendible_hash_table::ExtendibleHashTable;
