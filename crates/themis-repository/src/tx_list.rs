// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_types::{Transaction, TypesError};

/// Append-only binary Merkle tree over leaf hashes. The root is the
/// pairwise concat-hash reduction of the leaves; an odd node is promoted
/// unchanged, and the empty tree has the null root.
pub struct MerkleTree {
    cryptor: Arc<dyn Cryptor>,
    leaves: Vec<Hash>,
}

impl MerkleTree {
    pub fn new(cryptor: Arc<dyn Cryptor>) -> Self {
        MerkleTree {
            cryptor,
            leaves: Vec::new(),
        }
    }

    pub fn push(&mut self, leaf: Hash) {
        self.leaves.push(leaf);
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn top(&self) -> Hash {
        if self.leaves.is_empty() {
            return Hash::null();
        }
        let mut level = self.leaves.clone();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => self.cryptor.concat_hash(&[left.as_ref(), right.as_ref()]),
                    [odd] => odd.clone(),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
        }
        level.remove(0)
    }
}

/// The ordered transactions of one block plus their Merkle root, the value
/// a block header carries as its transaction list hash.
pub struct TxList {
    cryptor: Arc<dyn Cryptor>,
    txs: Vec<Transaction>,
    tree: MerkleTree,
}

impl TxList {
    pub fn new(cryptor: Arc<dyn Cryptor>) -> Self {
        let tree = MerkleTree::new(Arc::clone(&cryptor));
        TxList {
            cryptor,
            txs: Vec::new(),
            tree,
        }
    }

    pub fn push(&mut self, tx: Transaction) -> Result<(), TypesError> {
        let hash = tx.hash(&*self.cryptor)?;
        self.tree.push(hash);
        self.txs.push(tx);
        Ok(())
    }

    pub fn top(&self) -> Hash {
        self.tree.top()
    }

    pub fn list(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_crypto::Ed25519Sha256Cryptor;

    fn cryptor() -> Arc<dyn Cryptor> {
        Arc::new(Ed25519Sha256Cryptor::new())
    }

    #[test]
    fn empty_tree_has_the_null_root() {
        assert!(MerkleTree::new(cryptor()).top().is_null());
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let mut tree = MerkleTree::new(cryptor());
        let leaf = Hash::new(vec![1; 32]);
        tree.push(leaf.clone());
        assert_eq!(tree.top(), leaf);
    }

    #[test]
    fn root_depends_on_leaf_order() {
        let a = Hash::new(vec![1; 32]);
        let b = Hash::new(vec![2; 32]);

        let mut forward = MerkleTree::new(cryptor());
        forward.push(a.clone());
        forward.push(b.clone());

        let mut backward = MerkleTree::new(cryptor());
        backward.push(b);
        backward.push(a);

        assert_ne!(forward.top(), backward.top());
    }

    #[test]
    fn odd_leaf_counts_reduce() {
        let cryptor = cryptor();
        let mut tree = MerkleTree::new(Arc::clone(&cryptor));
        for n in 1..=5u8 {
            tree.push(Hash::new(vec![n; 32]));
        }
        assert_eq!(tree.len(), 5);

        // Same leaves, same root.
        let mut again = MerkleTree::new(cryptor);
        for n in 1..=5u8 {
            again.push(Hash::new(vec![n; 32]));
        }
        assert_eq!(tree.top(), again.top());
    }

    #[test]
    fn tx_list_tracks_transactions_and_root() {
        let cryptor: Arc<dyn Cryptor> = Arc::new(Ed25519Sha256Cryptor::new());
        let mut tx_list = TxList::new(Arc::clone(&cryptor));
        assert!(tx_list.top().is_null());

        let tx = Transaction::builder()
            .created_time(3)
            .add_balance("a@b", "a@b", 5)
            .build();
        tx_list.push(tx.clone()).unwrap();

        assert_eq!(tx_list.len(), 1);
        assert_eq!(tx_list.top(), tx.hash(&*cryptor).unwrap());
        assert_eq!(tx_list.list()[0], tx);
    }
}
