// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! A content-addressed Merkle–Patricia tree with versioned leaf chains.
//!
//! The tree is a radix tree over byte keys. Every node is immutable once
//! stored: its identity is the cryptographic hash of its serialized form, so
//! an update produces a fresh path from the touched leaf up to a new root and
//! leaves every historical root readable. A logical key maps to a *leaf
//! chain*: each update appends a new leaf whose `prev_hash` points at the
//! previous version, heights counting up from zero, which gives per-key
//! history for free.
//!
//! The tree itself never deletes anything and never partially mutates.
//! Either an upsert returns a new root hash, or nothing observable changed;
//! unreachable nodes are safe to orphan.

mod node;
mod tree;


pub use node::{InternalNode, LeafNode, Node, NodeDecodeError};
pub use tree::{KVNode, MerklePatriciaTree, NodeCursor};

use themis_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MptError {
    /// The exact key is not present in the tree.
    #[error("key not found in merkle patricia tree")]
    NotFoundKey,

    /// No node's edge label matches the search prefix.
    #[error("no node matches the search prefix")]
    NotSearchKey,

    /// The operation is only defined on a leaf node.
    #[error("operation requires a leaf node")]
    NotLeaf,

    /// A stored node failed to decode or violated a structural invariant.
    #[error("corrupt node: {0}")]
    CorruptNode(String),

    /// A value failed to take its canonical byte form.
    #[error("value encoding failed: {0}")]
    Codec(String),

    /// The underlying key/value store failed.
    #[error("store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for MptError {
    fn from(err: StoreError) -> Self {
        match err {
            // A dangling reference and an absent key look the same at the
            // store boundary; both surface as a missing key.
            StoreError::NotFound => MptError::NotFoundKey,
            other => MptError::Store(other),
        }
    }
}

impl From<NodeDecodeError> for MptError {
    fn from(err: NodeDecodeError) -> Self {
        MptError::CorruptNode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MptError>;
