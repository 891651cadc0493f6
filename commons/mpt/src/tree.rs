// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::node::{InternalNode, LeafNode, Node};
use crate::{MptError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_store::{KeyValueStore, StoreError};
use tracing::debug;

/// A pending insertion: the not-yet-consumed key suffix plus the canonical
/// value bytes. The key shrinks as the upsert descends.
#[derive(Clone, Debug)]
pub struct KVNode {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl KVNode {
    pub fn new<T: Serialize>(key: impl Into<Vec<u8>>, value: &T) -> Result<Self> {
        let value = bcs::to_bytes(value).map_err(|e| MptError::Codec(e.to_string()))?;
        Ok(KVNode {
            key: key.into(),
            value,
        })
    }

    pub fn from_bytes(key: impl Into<Vec<u8>>, value: Vec<u8>) -> Self {
        KVNode {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    fn advance(&mut self, cnt: usize) {
        self.key.drain(..cnt);
    }
}

/// Longest common prefix length of `a` and `b`, and whether they are equal.
pub(crate) fn count_prefix_bytes(a: &[u8], b: &[u8]) -> (usize, bool) {
    let mut cnt = 0;
    while cnt < a.len() && cnt < b.len() {
        if a[cnt] != b[cnt] {
            return (cnt, false);
        }
        cnt += 1;
    }
    (cnt, a.len() == b.len())
}

/// A read/write cursor over one node. Holds shared handles to the store and
/// cryptor so traversal can load children and persistence can hash nodes;
/// cloning a cursor is cheap and never copies tree data.
#[derive(Clone)]
pub struct NodeCursor {
    store: Arc<dyn KeyValueStore>,
    cryptor: Arc<dyn Cryptor>,
    node: Node,
}

impl NodeCursor {
    pub fn new(store: Arc<dyn KeyValueStore>, cryptor: Arc<dyn Cryptor>, node: Node) -> Self {
        NodeCursor {
            store,
            cryptor,
            node,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_leaf(&self) -> bool {
        self.node.is_leaf()
    }

    pub fn leaf(&self) -> Option<&LeafNode> {
        match &self.node {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub fn internal(&self) -> Option<&InternalNode> {
        match &self.node {
            Node::Internal(internal) => Some(internal),
            Node::Leaf(_) => None,
        }
    }

    /// Content hash of the current node.
    pub fn hash(&self) -> Hash {
        self.node.merkle_hash(&*self.cryptor)
    }

    /// Decodes the value stored in the current leaf.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.node {
            Node::Leaf(leaf) => bcs::from_bytes(leaf.data())
                .map_err(|e| MptError::CorruptNode(format!("leaf value failed to decode: {e}"))),
            Node::Internal(_) => Err(MptError::NotLeaf),
        }
    }

    /// Cursor over the node stored under `hash`; the current cursor is
    /// untouched. This is the time-travel entry point.
    pub fn get(&self, hash: &Hash) -> Result<NodeCursor> {
        Ok(self.with_node(self.load_node(hash)?))
    }

    /// Re-points this cursor at the node stored under `hash`.
    pub fn set(&mut self, hash: &Hash) -> Result<()> {
        self.node = self.load_node(hash)?;
        Ok(())
    }

    /// Walks the full `key` down to the leaf-chain tip.
    pub fn find(&self, key: &[u8]) -> Result<NodeCursor> {
        let internal = match &self.node {
            Node::Leaf(_) => return Ok(self.clone()),
            Node::Internal(internal) => internal,
        };
        if internal.key().len() > key.len() {
            return Err(MptError::NotFoundKey);
        }
        if internal.key().len() == key.len() {
            if internal.key() != key {
                return Err(MptError::NotFoundKey);
            }
            return self.get_leaf(internal);
        }
        let next = self.get_child(internal, key[internal.key().len()])?;
        next.find(&key[internal.key().len()..])
    }

    /// Returns the shallowest node whose edge label starts with the
    /// remaining `key`, the subtree root for prefix enumeration.
    pub fn search(&self, key: &[u8]) -> Result<NodeCursor> {
        let internal = match &self.node {
            Node::Leaf(_) => return Ok(self.clone()),
            Node::Internal(internal) => internal,
        };
        if internal.key().len() >= key.len() {
            if !internal.key().starts_with(key) {
                return Err(MptError::NotSearchKey);
            }
            return Ok(self.clone());
        }
        let next = match self.get_child(internal, key[internal.key().len()]) {
            Ok(next) => next,
            Err(MptError::NotFoundKey) => return Err(MptError::NotSearchKey),
            Err(e) => return Err(e),
        };
        next.search(&key[internal.key().len()..])
    }

    /// Copy-on-write insert or update. Returns the cursor over the rebuilt
    /// node; every node along the touched path has been persisted under its
    /// new content hash by the time this returns.
    pub fn upsert(&self, kv: &mut KVNode) -> Result<NodeCursor> {
        let internal = match &self.node {
            Node::Leaf(_) => return self.append_raw(kv.value()),
            Node::Internal(internal) => internal,
        };
        let (cnt, perfect) = count_prefix_bytes(internal.key(), kv.key());
        kv.advance(cnt);

        if perfect {
            // Exact key: push a new version onto the leaf chain, or start
            // the chain when this branch point has none yet.
            let new_leaf = match self.get_leaf(internal) {
                Ok(tip) => tip.append_raw(kv.value())?,
                Err(MptError::NotFoundKey) => self.create_node(Node::Leaf(LeafNode::new(
                    0,
                    Hash::null(),
                    kv.value().to_vec(),
                )))?,
                Err(e) => return Err(e),
            };
            return self.create_internal(internal, cnt, &new_leaf);
        }

        if internal.key().len() == cnt {
            if let Some(&branch) = kv.key().first() {
                if internal.child(branch).is_some() {
                    let child = self.get_child(internal, branch)?;
                    let new_child = child.upsert(kv)?;
                    return self.create_internal(internal, cnt, &new_child);
                }
            }
        }

        // No matching edge: attach the remainder as a fresh leaf carrier,
        // splitting the current node when its own key is only partly shared.
        let carrier = self.create_leaf_carrier(kv)?;
        self.create_internal(internal, cnt, &carrier)
    }

    /// Loads the previous version of the current leaf.
    pub fn prev(&self) -> Result<NodeCursor> {
        let leaf = self.leaf().ok_or(MptError::NotLeaf)?;
        if leaf.prev_hash().is_null() {
            return Err(MptError::NotFoundKey);
        }
        let node = self.load_linked(leaf.prev_hash(), "leaf history")?;
        if !node.is_leaf() {
            return Err(MptError::CorruptNode(
                "leaf history points at an internal node".to_string(),
            ));
        }
        Ok(self.with_node(node))
    }

    /// Every leaf-chain tip beneath the current node, depth first, child
    /// edges in ascending byte order.
    pub fn sub_leafs(&self) -> Result<Vec<NodeCursor>> {
        let internal = match &self.node {
            Node::Leaf(_) => return Ok(vec![self.clone()]),
            Node::Internal(internal) => internal,
        };
        let mut leafs = Vec::new();
        if !internal.data_hash().is_null() {
            leafs.extend(self.get_leaf(internal)?.sub_leafs()?);
        }
        for branch in internal.childs().keys() {
            let child = self.get_child(internal, *branch)?;
            leafs.extend(child.sub_leafs()?);
        }
        Ok(leafs)
    }

    fn with_node(&self, node: Node) -> NodeCursor {
        NodeCursor {
            store: Arc::clone(&self.store),
            cryptor: Arc::clone(&self.cryptor),
            node,
        }
    }

    fn load_node(&self, hash: &Hash) -> Result<Node> {
        let bytes = self.store.load(hash)?;
        Ok(Node::decode(&bytes)?)
    }

    /// Loads a node referenced from inside another node. A missing target
    /// here is a dangling pointer, not an absent key.
    fn load_linked(&self, hash: &Hash, what: &str) -> Result<Node> {
        match self.store.load(hash) {
            Ok(bytes) => Ok(Node::decode(&bytes)?),
            Err(StoreError::NotFound) => {
                debug!("dangling {what} reference {hash:?}");
                Err(MptError::CorruptNode(format!("dangling {what} reference")))
            }
            Err(e) => Err(MptError::Store(e)),
        }
    }

    fn get_child(&self, internal: &InternalNode, branch: u8) -> Result<NodeCursor> {
        let hash = internal.child(branch).ok_or(MptError::NotFoundKey)?;
        let node = self.load_linked(hash, "child edge")?;
        if node.is_leaf() {
            return Err(MptError::CorruptNode(
                "child edge points at a leaf node".to_string(),
            ));
        }
        Ok(self.with_node(node))
    }

    fn get_leaf(&self, internal: &InternalNode) -> Result<NodeCursor> {
        if internal.data_hash().is_null() {
            return Err(MptError::NotFoundKey);
        }
        let node = self.load_linked(internal.data_hash(), "leaf chain")?;
        if !node.is_leaf() {
            return Err(MptError::CorruptNode(
                "leaf chain tip is not a leaf node".to_string(),
            ));
        }
        Ok(self.with_node(node))
    }

    /// Persists `node` under its content hash; an identical node already in
    /// the store is reused.
    fn create_node(&self, node: Node) -> Result<NodeCursor> {
        let cursor = self.with_node(node);
        let hash = cursor.hash();
        let bytes = cursor.node.encode()?;
        match self.store.store(&hash, &bytes) {
            Ok(()) | Err(StoreError::Duplicate) => Ok(cursor),
            Err(e) => Err(MptError::Store(e)),
        }
    }

    /// Persists the cursor's own node; used for fresh roots.
    pub(crate) fn persist(&self) -> Result<()> {
        let bytes = self.node.encode()?;
        match self.store.store(&self.hash(), &bytes) {
            Ok(()) | Err(StoreError::Duplicate) => Ok(()),
            Err(e) => Err(MptError::Store(e)),
        }
    }

    /// New height-0 leaf for the remainder of `kv`, wrapped in an internal
    /// carrier when key bytes remain to be consumed.
    fn create_leaf_carrier(&self, kv: &KVNode) -> Result<NodeCursor> {
        let leaf = self.create_node(Node::Leaf(LeafNode::new(
            0,
            Hash::null(),
            kv.value().to_vec(),
        )))?;
        if kv.key().is_empty() {
            return Ok(leaf);
        }
        let data_hash = leaf.hash();
        self.create_node(Node::Internal(InternalNode::new(
            kv.key().to_vec(),
            BTreeMap::new(),
            data_hash,
        )))
    }

    /// Rebuilds the current internal node at depth `cnt` with `child`
    /// attached. When `cnt` falls short of the node's own key, the node
    /// splits and its old suffix re-attaches as a child edge.
    fn create_internal(
        &self,
        internal: &InternalNode,
        cnt: usize,
        child: &NodeCursor,
    ) -> Result<NodeCursor> {
        let new_key = internal.key()[..cnt].to_vec();
        let mut new_childs;
        let mut new_data_hash;
        let mut linked = vec![child.clone()];
        if internal.key().len() == cnt {
            new_childs = internal.childs().clone();
            new_data_hash = internal.data_hash().clone();
            if child.is_leaf() {
                new_data_hash = child.hash();
            }
        } else {
            let split = self.create_node(Node::Internal(InternalNode::new(
                internal.key()[cnt..].to_vec(),
                internal.childs().clone(),
                internal.data_hash().clone(),
            )))?;
            new_childs = BTreeMap::new();
            new_data_hash = Hash::null();
            if child.is_leaf() {
                new_data_hash = child.hash();
                linked = vec![split];
            } else {
                linked.push(split);
            }
        }

        for it in &linked {
            if let Node::Internal(n) = it.node() {
                if let Some(&branch) = n.key().first() {
                    new_childs.insert(branch, it.hash());
                }
            }
        }

        self.create_node(Node::Internal(InternalNode::new(
            new_key,
            new_childs,
            new_data_hash,
        )))
    }

    /// New leaf version on top of the current one.
    fn append_raw(&self, value: &[u8]) -> Result<NodeCursor> {
        let leaf = self.leaf().ok_or(MptError::NotLeaf)?;
        let prev = self.hash();
        self.create_node(Node::Leaf(LeafNode::new(
            leaf.height() + 1,
            prev,
            value.to_vec(),
        )))
    }
}

/// The tree proper: a cursor pinned at the current root. Updates move the
/// root cursor; readers holding historical roots stay valid because stored
/// nodes never change.
pub struct MerklePatriciaTree {
    root: NodeCursor,
}

impl MerklePatriciaTree {
    /// Opens a tree. With `root_hash` the stored root is loaded (a missing
    /// node is an error); without, a fresh empty root keyed by `root_key` is
    /// created and persisted.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cryptor: Arc<dyn Cryptor>,
        root_hash: Option<&Hash>,
        root_key: u8,
    ) -> Result<Self> {
        let empty_root = Node::Internal(InternalNode::new(
            vec![root_key],
            BTreeMap::new(),
            Hash::null(),
        ));
        let seed = NodeCursor::new(store, cryptor, empty_root);
        let root = match root_hash {
            Some(hash) => seed.get(hash)?,
            None => {
                seed.persist()?;
                seed
            }
        };
        Ok(MerklePatriciaTree { root })
    }

    pub fn iterator(&self) -> &NodeCursor {
        &self.root
    }

    /// Current root content hash.
    pub fn root_hash(&self) -> Hash {
        self.root.hash()
    }

    /// Re-roots the tree at `hash`.
    pub fn set(&mut self, hash: &Hash) -> Result<()> {
        self.root.set(hash)
    }

    /// Cursor over an arbitrary historical root.
    pub fn get(&self, hash: &Hash) -> Result<NodeCursor> {
        self.root.get(hash)
    }

    pub fn find(&self, key: &[u8]) -> Result<NodeCursor> {
        self.root.find(key)
    }

    pub fn search(&self, key: &[u8]) -> Result<NodeCursor> {
        self.root.search(key)
    }

    /// Inserts or updates one logical key and adopts the rebuilt root.
    pub fn upsert(&mut self, mut kv: KVNode) -> Result<Hash> {
        let new_root = self.root.upsert(&mut kv)?;
        let hash = new_root.hash();
        self.root = new_root;
        Ok(hash)
    }
}
