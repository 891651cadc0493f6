// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::WSV_ROOT_KEY;
use mpt::{KVNode, MerklePatriciaTree, MptError};
use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_store::KeyValueStore;
use themis_types::{FinderError, Object, ObjectFinder};

/// The world-state view: accounts, peers and storages by id, backed by one
/// authenticated tree.
///
/// Appends move the working root only; `commit` publishes it as the stable
/// root and `rollback` returns to it. Nodes reached the store the moment
/// they were built, so neither operation touches durable bytes; the root
/// pointer is the only thing that moves.
pub struct Wsv {
    tree: MerklePatriciaTree,
    stable_root: Hash,
}

impl Wsv {
    /// Opens a view at `root`, or at a fresh empty state when `None`.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        cryptor: Arc<dyn Cryptor>,
        root: Option<&Hash>,
    ) -> Result<Self, MptError> {
        let tree = MerklePatriciaTree::new(store, cryptor, root, WSV_ROOT_KEY)?;
        let stable_root = tree.root_hash();
        Ok(Wsv { tree, stable_root })
    }

    fn state_key(id: &str) -> Vec<u8> {
        let mut key = vec![WSV_ROOT_KEY];
        key.extend_from_slice(id.as_bytes());
        key
    }

    /// Working root hash, the value that lands in a block header.
    pub fn hash(&self) -> Hash {
        self.tree.root_hash()
    }

    pub fn stable_hash(&self) -> &Hash {
        &self.stable_root
    }

    /// Publishes the working root as the stable root.
    pub fn commit(&mut self) {
        self.stable_root = self.tree.root_hash();
    }

    /// Discards staged appends and returns to the stable root.
    pub fn rollback(&mut self) -> Result<(), MptError> {
        let root = self.stable_root.clone();
        self.tree.set(&root)
    }

    /// Moves the working root to an arbitrary earlier point; used for
    /// per-transaction savepoints inside a block.
    pub(crate) fn reset_to(&mut self, root: &Hash) -> Result<(), MptError> {
        self.tree.set(root)
    }

    pub fn query_object(&self, id: &str) -> Result<Object, FinderError> {
        let leaf = match self.tree.find(&Self::state_key(id)) {
            Ok(leaf) => leaf,
            Err(MptError::NotFoundKey) => return Err(FinderError::not_found(id)),
            Err(e) => return Err(FinderError::Backend(e.to_string())),
        };
        leaf.data::<Object>()
            .map_err(|e| FinderError::Backend(e.to_string()))
    }

    /// Stages a new version of the object under `id`.
    pub fn append_object(&mut self, id: &str, object: &Object) -> Result<(), FinderError> {
        let kv = KVNode::new(Self::state_key(id), object)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        self.tree
            .upsert(kv)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        Ok(())
    }

    /// All current objects whose id starts with `prefix`, in key order.
    pub fn query_range(&self, prefix: &str) -> Result<Vec<Object>, FinderError> {
        let subtree = match self.tree.search(&Self::state_key(prefix)) {
            Ok(subtree) => subtree,
            Err(MptError::NotSearchKey) => return Ok(Vec::new()),
            Err(e) => return Err(FinderError::Backend(e.to_string())),
        };
        subtree
            .sub_leafs()
            .map_err(|e| FinderError::Backend(e.to_string()))?
            .iter()
            .map(|leaf| {
                leaf.data::<Object>()
                    .map_err(|e| FinderError::Backend(e.to_string()))
            })
            .collect()
    }

    /// Every historical version of `id`, newest first.
    pub fn query_history(&self, id: &str) -> Result<Vec<Object>, FinderError> {
        let mut cursor = match self.tree.find(&Self::state_key(id)) {
            Ok(leaf) => leaf,
            Err(MptError::NotFoundKey) => return Err(FinderError::not_found(id)),
            Err(e) => return Err(FinderError::Backend(e.to_string())),
        };
        let mut versions = Vec::new();
        loop {
            versions.push(
                cursor
                    .data::<Object>()
                    .map_err(|e| FinderError::Backend(e.to_string()))?,
            );
            cursor = match cursor.prev() {
                Ok(prev) => prev,
                Err(MptError::NotFoundKey) => break,
                Err(e) => return Err(FinderError::Backend(e.to_string())),
            };
        }
        Ok(versions)
    }
}

impl ObjectFinder for Wsv {
    fn query(&self, target_id: &str) -> Result<Object, FinderError> {
        self.query_object(target_id)
    }

    fn append(&mut self, target_id: &str, object: Object) -> Result<(), FinderError> {
        self.append_object(target_id, &object)
    }
}
