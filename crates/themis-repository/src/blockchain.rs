// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::BLOCKCHAIN_ROOT_KEY;
use mpt::{KVNode, MerklePatriciaTree, MptError};
use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_store::KeyValueStore;
use themis_types::{Block, FinderError};

/// Committed blocks by block hash.
pub struct Blockchain {
    tree: MerklePatriciaTree,
    cryptor: Arc<dyn Cryptor>,
    stable_root: Hash,
}

impl Blockchain {
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        cryptor: Arc<dyn Cryptor>,
        root: Option<&Hash>,
    ) -> Result<Self, MptError> {
        let tree = MerklePatriciaTree::new(store, Arc::clone(&cryptor), root, BLOCKCHAIN_ROOT_KEY)?;
        let stable_root = tree.root_hash();
        Ok(Blockchain {
            tree,
            cryptor,
            stable_root,
        })
    }

    fn block_key(block_hash: &Hash) -> Vec<u8> {
        let mut key = vec![BLOCKCHAIN_ROOT_KEY];
        key.extend_from_slice(block_hash.as_ref());
        key
    }

    pub fn hash(&self) -> Hash {
        self.tree.root_hash()
    }

    pub fn commit(&mut self) {
        self.stable_root = self.tree.root_hash();
    }

    pub fn rollback(&mut self) -> Result<(), MptError> {
        let root = self.stable_root.clone();
        self.tree.set(&root)
    }

    pub fn get(&self, block_hash: &Hash) -> Result<Block, FinderError> {
        let leaf = match self.tree.find(&Self::block_key(block_hash)) {
            Ok(leaf) => leaf,
            Err(MptError::NotFoundKey) => return Err(FinderError::not_found(block_hash.to_string())),
            Err(e) => return Err(FinderError::Backend(e.to_string())),
        };
        leaf.data::<Block>()
            .map_err(|e| FinderError::Backend(e.to_string()))
    }

    pub fn append(&mut self, block: &Block) -> Result<(), FinderError> {
        let block_hash = block
            .hash(&*self.cryptor)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        let kv = KVNode::new(Self::block_key(&block_hash), block)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        self.tree
            .upsert(kv)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        Ok(())
    }
}
