// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use themis_crypto::PublicKey;

/// A consensus peer. Freshly added peers are active; `banned` is terminal
/// and is never cleared by any command.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub peer_id: String,
    pub address: String,
    pub public_key: PublicKey,
    pub active: bool,
    pub banned: bool,
}

impl Peer {
    pub fn new(
        peer_id: impl Into<String>,
        address: impl Into<String>,
        public_key: PublicKey,
    ) -> Self {
        Peer {
            peer_id: peer_id.into(),
            address: address.into(),
            public_key,
            active: true,
            banned: false,
        }
    }
}
