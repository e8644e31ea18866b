//! # Storage
//!
//! Generic `Storage` trait that can be implemented for different
//! specific storage backends.
use std::result;

/// Result with error set to `failure::Error`
pub type Result<T> = result::Result<T, failure::Error>;

/// Generic trait that exposes a simple key-ordered table API for data
/// storage.
///
/// Keys are plain byte strings and iterate in lexicographic order, so
/// callers can lay out logical tables as key prefixes and scan them in
/// either direction.
pub trait Storage {
    /// Get a value from the storage given a key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Put a value in the storage
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Delete a value from the storage
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Create an iterator over all the keys that start with the given
    /// prefix, in ascending key order
    fn prefix_iterator<'a, 'b: 'a>(&'a self, prefix: &'b [u8]) -> Result<StorageIterator<'a>>;

    /// Create an iterator over all the keys that start with the given
    /// prefix, in descending key order
    fn prefix_iterator_reverse<'a, 'b: 'a>(
        &'a self,
        prefix: &'b [u8],
    ) -> Result<StorageIterator<'a>>;

    /// Atomically write a batch of operations
    fn write(&self, batch: WriteBatch) -> Result<()>;
}

/// Iterator over key-value pairs
pub type StorageIterator<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

#[derive(Default)]
/// An atomic batch of operations. To persist the changes, use `Storage::write`.
pub struct WriteBatch {
    /// List of changes
    pub batch: Vec<WriteBatchItem>,
}

impl WriteBatch {
    /// Add a put operation to the batch
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.batch.push(WriteBatchItem::Put(key, value));
    }
    /// Add a delete operation to the batch
    pub fn delete(&mut self, key: Vec<u8>) {
        self.batch.push(WriteBatchItem::Delete(key));
    }
    /// Whether the batch contains no operations
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// WriteBatch item
pub enum WriteBatchItem {
    /// Put
    Put(Vec<u8>, Vec<u8>),
    /// Delete
    Delete(Vec<u8>),
}
