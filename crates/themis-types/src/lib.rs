// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! The object model of the node: every value the world state can hold, the
//! command set that mutates it, and the transaction/block envelopes that
//! carry commands.
//!
//! All values are immutable; builders produce fresh values. Canonical bytes
//! come from BCS so equality, hashing and storage agree everywhere.

pub mod account;
pub mod block;
pub mod command;
pub mod finder;
pub mod ids;
pub mod object;
pub mod peer;
pub mod signature;
pub mod storage;
pub mod transaction;

pub use account::{Account, AccountBuilder};
pub use block::{Block, BlockBuilder, BlockPayload};
pub use command::{Command, CommandKind};
pub use finder::{FinderError, ObjectFinder};
pub use object::{Object, ObjectCode};
pub use peer::Peer;
pub use signature::Signature;
pub use storage::{Storage, StorageBuilder};
pub use transaction::{Transaction, TxBuilder, TxPayload};

use themis_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("canonical encoding failed: {0}")]
    Codec(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("payload carries no signatures")]
    Unsigned,
}

pub(crate) fn to_canonical_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TypesError> {
    bcs::to_bytes(value).map_err(|e| TypesError::Codec(e.to_string()))
}
