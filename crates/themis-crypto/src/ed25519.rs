// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{CryptoError, Cryptor, Hash, PrivateKey, PublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const DIGEST_LEN: usize = 32;

/// SHA-256 digests with Ed25519 signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Sha256Cryptor;

impl Ed25519Sha256Cryptor {
    pub fn new() -> Self {
        Ed25519Sha256Cryptor
    }

    fn signing_key(private_key: &PrivateKey) -> Result<SigningKey, CryptoError> {
        let bytes: &[u8; 32] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("private key must be 32 bytes".to_string()))?;
        Ok(SigningKey::from_bytes(bytes))
    }

    fn verifying_key(public_key: &PublicKey) -> Result<VerifyingKey, CryptoError> {
        let bytes: &[u8; 32] = public_key
            .as_bytes()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("not a curve point: {e}")))
    }
}

impl Cryptor for Ed25519Sha256Cryptor {
    fn concat_hash(&self, parts: &[&[u8]]) -> Hash {
        if parts.iter().all(|p| p.is_empty()) {
            return Hash::null();
        }
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Hash::new(hasher.finalize().to_vec())
    }

    fn hash_len(&self) -> usize {
        DIGEST_LEN
    }

    fn sign(&self, payload: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        let key = Self::signing_key(private_key)?;
        Ok(key.sign(payload).to_bytes().to_vec())
    }

    fn verify(
        &self,
        public_key: &PublicKey,
        payload: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let key = Self::verifying_key(public_key)?;
        let signature =
            Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
        key.verify(payload, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    fn new_key_pair(&self) -> (PublicKey, PrivateKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = PublicKey::new(signing_key.verifying_key().to_bytes().to_vec());
        let private = PrivateKey::new(signing_key.to_bytes().to_vec());
        (public, private)
    }
}
