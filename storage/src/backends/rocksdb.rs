//! # Rocksdb storage backend
//!
//! Storage backend that persists data in the file system using a RocksDB database.
use failure::Fail;

use crate::storage::{Result, Storage, StorageIterator, WriteBatch, WriteBatchItem};

/// Rocksdb backend
pub type Backend = rocksdb::DB;

/// Rocksdb Options
pub type Options = rocksdb::Options;

#[derive(Debug, Fail)]
#[fail(display = "RocksDB error: {}", _0)]
struct Error(#[fail(cause)] rocksdb::Error);

/// Smallest byte string strictly greater than every key starting with
/// `prefix`. Empty when no such bound exists (prefix is all `0xff`).
fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < 0xff {
            bound.push(last + 1);
            break;
        }
    }
    bound
}

impl Storage for Backend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let result = Backend::get(self, key)
            .map(|opt| opt.map(|dbvec| dbvec.to_vec()))
            .map_err(Error)?;
        Ok(result)
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        Backend::put(self, key, value).map_err(Error)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Backend::delete(self, key).map_err(Error)?;
        Ok(())
    }

    fn prefix_iterator<'a, 'b: 'a>(&'a self, prefix: &'b [u8]) -> Result<StorageIterator<'a>> {
        let iterator = self
            .iterator(rocksdb::IteratorMode::From(
                prefix,
                rocksdb::Direction::Forward,
            ))
            .filter_map(|result| {
                result
                    .ok()
                    .map(|(k, v)| (Vec::<u8>::from(k), Vec::<u8>::from(v)))
            })
            .take_while(move |(k, _v)| k.starts_with(prefix));

        Ok(Box::new(iterator))
    }

    fn prefix_iterator_reverse<'a, 'b: 'a>(
        &'a self,
        prefix: &'b [u8],
    ) -> Result<StorageIterator<'a>> {
        let bound = prefix_upper_bound(prefix);
        let mode = if bound.is_empty() {
            rocksdb::IteratorMode::End
        } else {
            rocksdb::IteratorMode::From(&bound, rocksdb::Direction::Reverse)
        };
        let iterator = self
            .iterator(mode)
            .filter_map(|result| {
                result
                    .ok()
                    .map(|(k, v)| (Vec::<u8>::from(k), Vec::<u8>::from(v)))
            })
            // the seek position may land on the bound key itself
            .skip_while(move |(k, _v)| !k.starts_with(prefix))
            .take_while(move |(k, _v)| k.starts_with(prefix));

        Ok(Box::new(iterator))
    }

    /// Atomically write a batch of operations
    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut rocksdb_batch = rocksdb::WriteBatch::default();

        for item in batch.batch {
            match item {
                WriteBatchItem::Put(key, value) => {
                    rocksdb_batch.put(key, value);
                }
                WriteBatchItem::Delete(key) => {
                    rocksdb_batch.delete(key);
                }
            }
        }

        Backend::write(self, rocksdb_batch).map_err(Error)?;

        Ok(())
    }
}
