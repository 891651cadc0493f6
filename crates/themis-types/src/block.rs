// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Signature, TypesError, to_canonical_bytes};
use serde::{Deserialize, Serialize};
use themis_crypto::{Cryptor, Hash, PrivateKey, PublicKey};

/// Header written by the state core. `wsv_hash` and `tx_history_hash` are
/// the MPT roots at commit time; `tx_list_hash` is the Merkle root over the
/// block's transaction hashes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockPayload {
    pub height: i64,
    pub pre_block_hash: Hash,
    pub created_time: i64,
    pub wsv_hash: Hash,
    pub tx_history_hash: Hash,
    pub tx_list_hash: Hash,
    pub round: i32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub payload: BlockPayload,
    pub signature: Signature,
}

impl Block {
    pub fn builder() -> BlockBuilder {
        BlockBuilder::default()
    }

    pub fn hash(&self, cryptor: &dyn Cryptor) -> Result<Hash, TypesError> {
        Ok(cryptor.hash(&to_canonical_bytes(&self.payload)?))
    }

    pub fn sign(
        &mut self,
        cryptor: &dyn Cryptor,
        public_key: &PublicKey,
        private_key: &PrivateKey,
    ) -> Result<(), TypesError> {
        let hash = self.hash(cryptor)?;
        let signature = cryptor.sign(hash.as_ref(), private_key)?;
        self.signature = Signature::new(public_key.clone(), signature);
        Ok(())
    }

    pub fn verify(&self, cryptor: &dyn Cryptor) -> Result<(), TypesError> {
        if self.signature.signature.is_empty() {
            return Err(TypesError::Unsigned);
        }
        let hash = self.hash(cryptor)?;
        cryptor.verify(
            &self.signature.public_key,
            hash.as_ref(),
            &self.signature.signature,
        )?;
        Ok(())
    }
}

#[derive(Default)]
pub struct BlockBuilder {
    payload: BlockPayload,
}

impl BlockBuilder {
    pub fn height(mut self, height: i64) -> Self {
        self.payload.height = height;
        self
    }

    pub fn pre_block_hash(mut self, hash: Hash) -> Self {
        self.payload.pre_block_hash = hash;
        self
    }

    pub fn created_time(mut self, time: i64) -> Self {
        self.payload.created_time = time;
        self
    }

    pub fn wsv_hash(mut self, hash: Hash) -> Self {
        self.payload.wsv_hash = hash;
        self
    }

    pub fn tx_history_hash(mut self, hash: Hash) -> Self {
        self.payload.tx_history_hash = hash;
        self
    }

    pub fn tx_list_hash(mut self, hash: Hash) -> Self {
        self.payload.tx_list_hash = hash;
        self
    }

    pub fn round(mut self, round: i32) -> Self {
        self.payload.round = round;
        self
    }

    pub fn build(self) -> Block {
        Block {
            payload: self.payload,
            signature: Signature::default(),
        }
    }
}
