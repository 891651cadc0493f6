// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Account, Object, Peer, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use themis_crypto::PublicKey;

/// A user-defined keyed record. The key set and the kind of each entry are
/// fixed when the storage is defined; instances created from the definition
/// carry the same shape under a wallet id.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: String,
    pub object: BTreeMap<String, Object>,
}

impl Storage {
    pub fn builder() -> StorageBuilder {
        StorageBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.object.get(key)
    }
}

#[derive(Default)]
pub struct StorageBuilder {
    inner: Storage,
}

impl StorageBuilder {
    pub fn from(storage: Storage) -> Self {
        StorageBuilder { inner: storage }
    }

    pub fn from_map(mut self, entries: BTreeMap<String, Object>) -> Self {
        self.inner.object.extend(entries);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.inner.id = id.into();
        self
    }

    pub fn set(mut self, key: impl Into<String>, object: Object) -> Self {
        self.inner.object.insert(key.into(), object);
        self
    }

    pub fn int32(self, key: impl Into<String>, value: i32) -> Self {
        self.set(key, Object::Int32(value))
    }

    pub fn int64(self, key: impl Into<String>, value: i64) -> Self {
        self.set(key, Object::Int64(value))
    }

    pub fn uint32(self, key: impl Into<String>, value: u32) -> Self {
        self.set(key, Object::Uint32(value))
    }

    pub fn uint64(self, key: impl Into<String>, value: u64) -> Self {
        self.set(key, Object::Uint64(value))
    }

    pub fn string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, Object::String(value.into()))
    }

    pub fn bytes(self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.set(key, Object::Bytes(value))
    }

    pub fn address(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, Object::Address(value.into()))
    }

    pub fn signature(self, key: impl Into<String>, value: Signature) -> Self {
        self.set(key, Object::Signature(value))
    }

    pub fn account(self, key: impl Into<String>, value: Account) -> Self {
        self.set(key, Object::Account(value))
    }

    pub fn peer(self, key: impl Into<String>, value: Peer) -> Self {
        self.set(key, Object::Peer(value))
    }

    pub fn public_key(self, key: impl Into<String>, value: PublicKey) -> Self {
        self.set(key, Object::Bytes(value.as_bytes().to_vec()))
    }

    pub fn list(self, key: impl Into<String>, value: Vec<Object>) -> Self {
        self.set(key, Object::List(value))
    }

    pub fn dict(self, key: impl Into<String>, value: BTreeMap<String, Object>) -> Self {
        self.set(key, Object::Dict(value))
    }

    pub fn build(self) -> Storage {
        self.inner
    }
}
