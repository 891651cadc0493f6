// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hashing and signing primitives shared by every layer of the node.
//!
//! The [`Cryptor`] trait is the single entry point for digests and
//! signatures; the rest of the workspace never names a concrete algorithm.
//! [`Ed25519Sha256Cryptor`] is the production implementation.

mod ed25519;
mod hash;

pub use ed25519::Ed25519Sha256Cryptor;
pub use hash::Hash;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("signature verification failed")]
    VerificationFailed,
}

/// A raw public key as carried in accounts, peers and signatures.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for PublicKey {
    fn from(bytes: Vec<u8>) -> Self {
        PublicKey(bytes)
    }
}

/// A raw private key. Never serialized into the state tree.
#[derive(Clone)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        PrivateKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Deterministic hashing plus signing, injected once at construction and
/// shared by reference afterwards.
pub trait Cryptor: Send + Sync {
    /// Digest of the plain concatenation of `parts`.
    ///
    /// Null byte strings and empty byte strings are the same input: both
    /// contribute zero bytes. When every part is empty the result is the
    /// null [`Hash`], which no real digest can collide with.
    fn concat_hash(&self, parts: &[&[u8]]) -> Hash;

    /// Digest width in bytes of this cryptor instance.
    fn hash_len(&self) -> usize;

    fn sign(&self, payload: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, CryptoError>;

    fn verify(
        &self,
        public_key: &PublicKey,
        payload: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;

    fn new_key_pair(&self) -> (PublicKey, PrivateKey);

    /// Digest of a single byte string.
    fn hash(&self, bytes: &[u8]) -> Hash {
        self.concat_hash(&[bytes])
    }
}
