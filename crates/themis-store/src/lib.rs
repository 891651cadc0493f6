// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! The key/value store boundary of the node.
//!
//! Everything durable goes through [`KeyValueStore`]: an opaque byte→byte map
//! keyed by content hash. Storing under an already-present key reports
//! [`StoreError::Duplicate`] so content-addressed writers can deduplicate
//! instead of failing.

use parking_lot::RwLock;
use std::collections::HashMap;
use themis_crypto::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no value stored under the given key")]
    NotFound,

    /// The key is already present. Distinct from a failure: a
    /// content-addressed put of an identical value is idempotent and callers
    /// are expected to treat this as success.
    #[error("a value is already stored under the given key")]
    Duplicate,

    #[error("store io failure: {0}")]
    Io(String),
}

pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`. The null hash is never a valid
    /// key, so loading it reports `NotFound`.
    fn load(&self, key: &Hash) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`. Reports `Duplicate` when the key is
    /// already present, leaving the stored bytes untouched.
    fn store(&self, key: &Hash, value: &[u8]) -> Result<(), StoreError>;
}

/// Heap-backed store used by tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored entries; handy for dedup assertions in tests.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &Hash) -> Result<Vec<u8>, StoreError> {
        self.inner.read().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn store(&self, key: &Hash, value: &[u8]) -> Result<(), StoreError> {
        let mut locked = self.inner.write();
        if locked.contains_key(key) {
            return Err(StoreError::Duplicate);
        }
        locked.insert(key.clone(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_key_reports_not_found() {
        let store = MemoryStore::new();
        let err = store.load(&Hash::new(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn load_null_hash_reports_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.load(&Hash::null()), Err(StoreError::NotFound)));
    }

    #[test]
    fn store_then_load_round_trips() {
        let store = MemoryStore::new();
        let key = Hash::new(vec![7; 32]);
        store.store(&key, b"node bytes").unwrap();
        assert_eq!(store.load(&key).unwrap(), b"node bytes");
    }

    #[test]
    fn second_store_under_same_key_is_duplicate() {
        let store = MemoryStore::new();
        let key = Hash::new(vec![7; 32]);
        store.store(&key, b"node bytes").unwrap();
        let err = store.store(&key, b"node bytes").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&key).unwrap(), b"node bytes");
    }
}
