// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use themis_crypto::{Cryptor, Hash};
use thiserror::Error;

/// Number of possible child edges under an internal node, one per byte.
pub(crate) const CHILD_FANOUT: usize = 256;

const TAG_INTERNAL: u8 = 1;
const TAG_LEAF: u8 = 2;

/// A radix branch. `key` is the edge label consumed by traversing into this
/// node, not the absolute key. For every entry `childs[b] = h`, the node at
/// `h` is an internal node whose own key starts with `b`. `data_hash` points
/// at the tip of the leaf chain for the exact key ending here, or is null.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InternalNode {
    key: Vec<u8>,
    childs: BTreeMap<u8, Hash>,
    data_hash: Hash,
}

impl InternalNode {
    pub fn new(key: Vec<u8>, childs: BTreeMap<u8, Hash>, data_hash: Hash) -> Self {
        InternalNode {
            key,
            childs,
            data_hash,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn childs(&self) -> &BTreeMap<u8, Hash> {
        &self.childs
    }

    pub fn child(&self, branch: u8) -> Option<&Hash> {
        self.childs.get(&branch)
    }

    pub fn data_hash(&self) -> &Hash {
        &self.data_hash
    }
}

/// One historical version of a logical key. `prev_hash` is the node hash of
/// the previous version (height − 1), null at height zero. `data` holds the
/// canonical serialization of the stored value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
    height: i64,
    prev_hash: Hash,
    data: Vec<u8>,
}

impl LeafNode {
    pub fn new(height: i64, prev_hash: Hash, data: Vec<u8>) -> Self {
        LeafNode {
            height,
            prev_hash,
            data,
        }
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.prev_hash
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Serializes to bytes for physical storage: a one-byte variant tag
    /// followed by the canonical body.
    pub fn encode(&self) -> Result<Vec<u8>, NodeDecodeError> {
        let mut out = Vec::new();
        match self {
            Node::Internal(internal) => {
                out.push(TAG_INTERNAL);
                out.extend(bcs::to_bytes(internal).map_err(NodeDecodeError::Body)?);
            }
            Node::Leaf(leaf) => {
                out.push(TAG_LEAF);
                out.extend(bcs::to_bytes(leaf).map_err(NodeDecodeError::Body)?);
            }
        }
        Ok(out)
    }

    /// Recovers a node from serialized bytes in physical storage.
    pub fn decode(bytes: &[u8]) -> Result<Node, NodeDecodeError> {
        let (tag, body) = bytes.split_first().ok_or(NodeDecodeError::EmptyInput)?;
        match *tag {
            TAG_INTERNAL => Ok(Node::Internal(
                bcs::from_bytes(body).map_err(NodeDecodeError::Body)?,
            )),
            TAG_LEAF => Ok(Node::Leaf(
                bcs::from_bytes(body).map_err(NodeDecodeError::Body)?,
            )),
            unknown_tag => Err(NodeDecodeError::UnknownTag { unknown_tag }),
        }
    }

    /// Content hash of this node.
    ///
    /// Leaf: digest of `prev_hash ‖ data ‖ base10(height)`.
    ///
    /// Internal: a 256-slot child vector is digested first (absent slots
    /// contribute nothing), then the node hash is the digest of
    /// `child_vector_hash ‖ data_hash ‖ key`.
    pub fn merkle_hash(&self, cryptor: &dyn Cryptor) -> Hash {
        match self {
            Node::Leaf(leaf) => {
                let height = leaf.height().to_string();
                cryptor.concat_hash(&[leaf.prev_hash().as_ref(), leaf.data(), height.as_bytes()])
            }
            Node::Internal(internal) => {
                const EMPTY: &[u8] = &[];
                let mut child_vec: Vec<&[u8]> = vec![EMPTY; CHILD_FANOUT];
                for (branch, hash) in internal.childs() {
                    child_vec[*branch as usize] = hash.as_ref();
                }
                let childs_hash = cryptor.concat_hash(&child_vec);
                cryptor.concat_hash(&[
                    childs_hash.as_ref(),
                    internal.data_hash().as_ref(),
                    internal.key(),
                ])
            }
        }
    }
}

impl From<InternalNode> for Node {
    fn from(node: InternalNode) -> Self {
        Node::Internal(node)
    }
}

impl From<LeafNode> for Node {
    fn from(node: LeafNode) -> Self {
        Node::Leaf(node)
    }
}

/// Error thrown when a [`Node`] fails to round-trip through physical storage.
#[derive(Debug, Error)]
pub enum NodeDecodeError {
    #[error("missing tag due to empty input")]
    EmptyInput,

    #[error("lead tag byte is unknown: {unknown_tag}")]
    UnknownTag { unknown_tag: u8 },

    #[error("node body failed to round-trip: {0}")]
    Body(bcs::Error),
}
