// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// A content hash as produced by a [`Cryptor`](crate::Cryptor).
///
/// The zero-length value is the *null* hash: it denotes "no value" (an absent
/// leaf chain, the previous hash of a height-0 leaf, the parent of a genesis
/// block) and is distinguishable from every real digest, which always has the
/// cryptor's full width.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Hash(Vec<u8>);

impl Hash {
    pub fn null() -> Self {
        Hash(Vec::new())
    }

    pub fn new(bytes: Vec<u8>) -> Self {
        Hash(bytes)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Hash {
    fn from(bytes: Vec<u8>) -> Self {
        Hash(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Hash(null)")
        } else {
            write!(f, "Hash(0x{})", hex::encode(&self.0))
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}
