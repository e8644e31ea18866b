//! # BTreeMap storage backend
//!
//! Storage backend that keeps data in a heap-allocated BTreeMap.
//!
//! Please note that this backend lacks persistence. Data is preserved only
//! for the lifetime of the storage object. It is the backend used for
//! ephemeral, single-handle sessions.
use std::{
    collections::BTreeMap,
    ops::Bound::{Included, Unbounded},
    sync::RwLock,
};

use crate::storage::{Result, Storage, StorageIterator, WriteBatch, WriteBatchItem};

/// BTreeMap backend
pub type Backend = RwLock<BTreeMap<Vec<u8>, Vec<u8>>>;

fn prefix_entries(map: &BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.range::<[u8], _>((Included(prefix), Unbounded))
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl Storage for Backend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read().unwrap().get(key).map(|slice| slice.to_vec()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.write().unwrap().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.write().unwrap().remove(key);
        Ok(())
    }

    fn prefix_iterator<'a, 'b: 'a>(&'a self, prefix: &'b [u8]) -> Result<StorageIterator<'a>> {
        let entries = prefix_entries(&self.read().unwrap(), prefix);

        Ok(Box::new(entries.into_iter()))
    }

    fn prefix_iterator_reverse<'a, 'b: 'a>(
        &'a self,
        prefix: &'b [u8],
    ) -> Result<StorageIterator<'a>> {
        let entries = prefix_entries(&self.read().unwrap(), prefix);

        Ok(Box::new(entries.into_iter().rev()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut map = self.write().unwrap();

        for item in batch.batch {
            match item {
                WriteBatchItem::Put(key, value) => {
                    map.insert(key, value);
                }
                WriteBatchItem::Delete(key) => {
                    map.remove(&key);
                }
            }
        }

        Ok(())
    }
}
