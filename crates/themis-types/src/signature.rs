// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use themis_crypto::PublicKey;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

impl Signature {
    pub fn new(public_key: PublicKey, signature: Vec<u8>) -> Self {
        Signature {
            public_key,
            signature,
        }
    }
}
