// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use themis_crypto::PublicKey;

/// An account addressable as `name@domain`.
///
/// `quorum` is the number of valid signatures by distinct `public_keys`
/// entries a transaction needs before this account may author it; a
/// well-formed authoring account keeps `0 < quorum <= public_keys.len()`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    pub public_keys: Vec<PublicKey>,
    pub quorum: i32,
    pub balance: i64,
    pub delegate_peer_id: String,
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    pub fn has_public_key(&self, key: &PublicKey) -> bool {
        self.public_keys.contains(key)
    }
}

#[derive(Default)]
pub struct AccountBuilder {
    inner: Account,
}

impl AccountBuilder {
    pub fn from(account: Account) -> Self {
        AccountBuilder { inner: account }
    }

    pub fn account_id(mut self, id: impl Into<String>) -> Self {
        self.inner.account_id = id.into();
        self
    }

    pub fn account_name(mut self, name: impl Into<String>) -> Self {
        self.inner.account_name = name.into();
        self
    }

    pub fn public_keys(mut self, keys: Vec<PublicKey>) -> Self {
        self.inner.public_keys = keys;
        self
    }

    pub fn quorum(mut self, quorum: i32) -> Self {
        self.inner.quorum = quorum;
        self
    }

    pub fn balance(mut self, balance: i64) -> Self {
        self.inner.balance = balance;
        self
    }

    pub fn delegate_peer_id(mut self, peer_id: impl Into<String>) -> Self {
        self.inner.delegate_peer_id = peer_id.into();
        self
    }

    pub fn build(self) -> Account {
        self.inner
    }
}
