// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    Account, Block, Command, Peer, Signature, Storage, Transaction, TypesError,
    to_canonical_bytes,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use themis_crypto::{Cryptor, Hash};

/// Discriminant of an [`Object`] variant, used in schema checks and
/// kind-mismatch errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ObjectCode {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    String,
    Bytes,
    Address,
    Signature,
    Account,
    Peer,
    List,
    Dict,
    Storage,
    Command,
    Transaction,
    Block,
}

/// Every value the world state can hold, as a tagged union.
///
/// `Dict` keys are ordered so canonical bytes are stable. The recursive
/// envelope variants are boxed to keep the in-memory footprint flat.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    String(String),
    Bytes(Vec<u8>),
    Address(String),
    Signature(Signature),
    Account(Account),
    Peer(Peer),
    List(Vec<Object>),
    Dict(BTreeMap<String, Object>),
    Storage(Storage),
    Command(Box<Command>),
    Transaction(Box<Transaction>),
    Block(Box<Block>),
}

impl Object {
    pub fn code(&self) -> ObjectCode {
        match self {
            Object::Bool(_) => ObjectCode::Bool,
            Object::Int32(_) => ObjectCode::Int32,
            Object::Int64(_) => ObjectCode::Int64,
            Object::Uint32(_) => ObjectCode::Uint32,
            Object::Uint64(_) => ObjectCode::Uint64,
            Object::String(_) => ObjectCode::String,
            Object::Bytes(_) => ObjectCode::Bytes,
            Object::Address(_) => ObjectCode::Address,
            Object::Signature(_) => ObjectCode::Signature,
            Object::Account(_) => ObjectCode::Account,
            Object::Peer(_) => ObjectCode::Peer,
            Object::List(_) => ObjectCode::List,
            Object::Dict(_) => ObjectCode::Dict,
            Object::Storage(_) => ObjectCode::Storage,
            Object::Command(_) => ObjectCode::Command,
            Object::Transaction(_) => ObjectCode::Transaction,
            Object::Block(_) => ObjectCode::Block,
        }
    }

    /// Canonical byte form; identical objects always serialize identically.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        to_canonical_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Object, TypesError> {
        bcs::from_bytes(bytes).map_err(|e| TypesError::Codec(e.to_string()))
    }

    /// Content hash over the canonical byte form.
    pub fn hash(&self, cryptor: &dyn Cryptor) -> Result<Hash, TypesError> {
        Ok(cryptor.hash(&self.to_bytes()?))
    }

    pub fn as_account(&self) -> Option<&Account> {
        match self {
            Object::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn as_peer(&self) -> Option<&Peer> {
        match self {
            Object::Peer(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn as_storage(&self) -> Option<&Storage> {
        match self {
            Object::Storage(storage) => Some(storage),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Object>> {
        match self {
            Object::List(list) => Some(list),
            _ => None,
        }
    }
}
