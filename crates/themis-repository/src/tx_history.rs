// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::TX_HISTORY_ROOT_KEY;
use mpt::{KVNode, MerklePatriciaTree, MptError};
use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_store::KeyValueStore;
use themis_types::{FinderError, Transaction};

/// Every committed transaction, keyed by transaction hash. Same staging
/// shape as the world-state view.
pub struct TxHistory {
    tree: MerklePatriciaTree,
    cryptor: Arc<dyn Cryptor>,
    stable_root: Hash,
}

impl TxHistory {
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        cryptor: Arc<dyn Cryptor>,
        root: Option<&Hash>,
    ) -> Result<Self, MptError> {
        let tree = MerklePatriciaTree::new(store, Arc::clone(&cryptor), root, TX_HISTORY_ROOT_KEY)?;
        let stable_root = tree.root_hash();
        Ok(TxHistory {
            tree,
            cryptor,
            stable_root,
        })
    }

    fn history_key(tx_hash: &Hash) -> Vec<u8> {
        let mut key = vec![TX_HISTORY_ROOT_KEY];
        key.extend_from_slice(tx_hash.as_ref());
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

    pub fn query(&self, tx_hash: &Hash) -> Result<Transaction, FinderError> {
        let leaf = match self.tree.find(&Self::history_key(tx_hash)) {
            Ok(leaf) => leaf,
            Err(MptError::NotFoundKey) => return Err(FinderError::not_found(tx_hash.to_string())),
            Err(e) => return Err(FinderError::Backend(e.to_string())),
        };
        leaf.data::<Transaction>()
            .map_err(|e| FinderError::Backend(e.to_string()))
    }

    /// Stages `tx` under its hash. Re-appending an already-present identical
    /// transaction is a no-op, so replays do not grow the history.
    pub fn append(&mut self, tx: &Transaction) -> Result<(), FinderError> {
        let tx_hash = tx
            .hash(&*self.cryptor)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        match self.query(&tx_hash) {
            Ok(existing) if existing == *tx => return Ok(()),
            Ok(_) | Err(FinderError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let kv = KVNode::new(Self::history_key(&tx_hash), tx)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        self.tree
            .upsert(kv)
            .map_err(|e| FinderError::Backend(e.to_string()))?;
        Ok(())
    }
}
