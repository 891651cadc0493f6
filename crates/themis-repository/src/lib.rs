// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! The repository layer: durable chain state and the block apply loop.
//!
//! A [`Repository`] owns the key/value store, the cryptor and the command
//! machinery, plus the durable root pointers (top block, world state,
//! transaction history, blockchain). [`Repository::begin`] snapshots those
//! pointers into a [`RepositoryTx`] whose views accept caller-provided root
//! hashes, so current-tip writes and historical reads share one path.
//! Nothing durable moves until a commit swaps the root pointers; rollback is
//! always safe because staged tree nodes are content-addressed orphans.

pub mod blockchain;
pub mod tx_history;
pub mod tx_list;
pub mod wsv;

pub use blockchain::Blockchain;
pub use tx_history::TxHistory;
pub use tx_list::{MerkleTree, TxList};
pub use wsv::Wsv;

use mpt::MptError;
use parking_lot::RwLock;
use std::sync::Arc;
use themis_crypto::{Cryptor, Hash};
use themis_executor::{
    CommandExecutor, CommandFailure, CommandValidator, ExecutionError, ValidationError,
};
use themis_store::KeyValueStore;
use themis_types::{Block, FinderError, Transaction, TypesError};
use thiserror::Error;
use tracing::{info, warn};

/// Root key bytes separating the three authenticated namespaces sharing one
/// key/value store.
pub const WSV_ROOT_KEY: u8 = 0x00;
pub const TX_HISTORY_ROOT_KEY: u8 = 0x01;
pub const BLOCKCHAIN_ROOT_KEY: u8 = 0x02;

/// Fixed creation time of the genesis block; identical genesis transaction
/// lists must reproduce identical roots on every run.
pub const GENESIS_CREATED_TIME: i64 = 0;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("no committed block yet")]
    EmptyChain,

    #[error("the chain already has a genesis block")]
    AlreadyInitialized,

    #[error("block height {got} does not follow the top height {expected}")]
    HeightMismatch { expected: i64, got: i64 },

    #[error("block does not extend the current top block")]
    DetachedBlock,

    #[error("block header {field} does not match the recomputed value")]
    HeaderMismatch { field: &'static str },

    #[error("transaction {tx_hash} carries invalid signatures: {detail}")]
    TxUnverified { tx_hash: Hash, detail: String },

    #[error("transaction {tx_hash} rejected: {source}")]
    TxRejected {
        tx_hash: Hash,
        #[source]
        source: ValidationError,
    },

    #[error("transaction {tx_hash} failed to execute: {source}")]
    TxFailed {
        tx_hash: Hash,
        #[source]
        source: ExecutionError,
    },

    #[error(transparent)]
    Mpt(#[from] MptError),

    #[error(transparent)]
    State(#[from] FinderError),

    #[error("codec failure: {0}")]
    Codec(String),
}

impl From<TypesError> for RepositoryError {
    fn from(err: TypesError) -> Self {
        RepositoryError::Codec(err.to_string())
    }
}

#[derive(Clone, Default)]
struct ChainState {
    top: Option<Block>,
    wsv_root: Option<Hash>,
    tx_history_root: Option<Hash>,
    blockchain_root: Option<Hash>,
}

/// Durable chain state plus the apply loop. Single writer by contract; any
/// number of readers may hold historical views concurrently.
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
    cryptor: Arc<dyn Cryptor>,
    validator: CommandValidator,
    executor: CommandExecutor,
    state: RwLock<ChainState>,
}

impl Repository {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cryptor: Arc<dyn Cryptor>,
        validator: CommandValidator,
        executor: CommandExecutor,
    ) -> Self {
        Repository {
            store,
            cryptor,
            validator,
            executor,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// The most recently committed block.
    pub fn top(&self) -> Option<Block> {
        self.state.read().top.clone()
    }

    /// Snapshots the current root pointers into a transaction handle.
    pub fn begin(&self) -> RepositoryTx {
        let state = self.state.read().clone();
        RepositoryTx {
            store: Arc::clone(&self.store),
            cryptor: Arc::clone(&self.cryptor),
            top: state.top,
            wsv_root: state.wsv_root,
            tx_history_root: state.tx_history_root,
            blockchain_root: state.blockchain_root,
        }
    }

    /// Builds the block a proposer would publish for `tx_list` on top of the
    /// current chain: applies the transactions against throwaway views and
    /// records the resulting roots in a fresh header. Nothing is published.
    pub fn propose(
        &self,
        tx_list: &TxList,
        created_time: i64,
        round: i32,
    ) -> Result<Block, RepositoryError> {
        let rtx = self.begin();
        let top = rtx.top().cloned().ok_or(RepositoryError::EmptyChain)?;
        let mut wsv = rtx.wsv(rtx.wsv_root())?;
        let mut tx_history = rtx.tx_history(rtx.tx_history_root())?;
        self.apply_tx_list(&mut wsv, &mut tx_history, tx_list, false)?;

        Ok(Block::builder()
            .height(top.payload.height + 1)
            .pre_block_hash(top.hash(&*self.cryptor)?)
            .created_time(created_time)
            .wsv_hash(wsv.hash())
            .tx_history_hash(tx_history.hash())
            .tx_list_hash(tx_list.top())
            .round(round)
            .build())
    }

    /// Creates and commits the height-0 block from `tx_list`. Every genesis
    /// transaction must apply cleanly.
    pub fn genesis_commit(&self, tx_list: &TxList) -> Result<Block, RepositoryError> {
        if self.top().is_some() {
            return Err(RepositoryError::AlreadyInitialized);
        }
        let rtx = self.begin();
        let mut wsv = rtx.wsv(None)?;
        let mut tx_history = rtx.tx_history(None)?;
        let mut blockchain = rtx.blockchain(None)?;

        self.apply_tx_list(&mut wsv, &mut tx_history, tx_list, true)?;

        let block = Block::builder()
            .height(0)
            .pre_block_hash(Hash::null())
            .created_time(GENESIS_CREATED_TIME)
            .wsv_hash(wsv.hash())
            .tx_history_hash(tx_history.hash())
            .tx_list_hash(tx_list.top())
            .round(0)
            .build();
        blockchain.append(&block)?;

        self.publish(&mut wsv, &mut tx_history, &mut blockchain, block.clone());
        info!(height = 0, "committed genesis block");
        Ok(block)
    }

    /// Validates and applies `block`: replays `tx_list` in order, checks the
    /// header's linkage and recomputed roots, then publishes. A transaction
    /// that fails validation is rolled back and skipped (it rejects itself,
    /// not the block), while store-level failures abort the whole block with
    /// every pointer unchanged.
    pub fn commit(&self, block: Block, tx_list: &TxList) -> Result<(), RepositoryError> {
        let rtx = self.begin();
        let top = rtx.top().cloned().ok_or(RepositoryError::EmptyChain)?;

        if block.payload.height != top.payload.height + 1 {
            return Err(RepositoryError::HeightMismatch {
                expected: top.payload.height,
                got: block.payload.height,
            });
        }
        if block.payload.pre_block_hash != top.hash(&*self.cryptor)? {
            return Err(RepositoryError::DetachedBlock);
        }

        let mut wsv = rtx.wsv(rtx.wsv_root())?;
        let mut tx_history = rtx.tx_history(rtx.tx_history_root())?;
        let mut blockchain = rtx.blockchain(rtx.blockchain_root())?;

        self.apply_tx_list(&mut wsv, &mut tx_history, tx_list, false)?;

        if wsv.hash() != block.payload.wsv_hash {
            return Err(RepositoryError::HeaderMismatch { field: "wsv_hash" });
        }
        if tx_history.hash() != block.payload.tx_history_hash {
            return Err(RepositoryError::HeaderMismatch {
                field: "tx_history_hash",
            });
        }
        if tx_list.top() != block.payload.tx_list_hash {
            return Err(RepositoryError::HeaderMismatch {
                field: "tx_list_hash",
            });
        }

        blockchain.append(&block)?;
        let height = block.payload.height;
        self.publish(&mut wsv, &mut tx_history, &mut blockchain, block);
        info!(height, txs = tx_list.len(), "committed block");
        Ok(())
    }

    /// Replays a transaction list against working views. In genesis mode any
    /// failing transaction aborts the caller; otherwise it is rolled back to
    /// its savepoint and skipped.
    fn apply_tx_list(
        &self,
        wsv: &mut Wsv,
        tx_history: &mut TxHistory,
        tx_list: &TxList,
        genesis: bool,
    ) -> Result<(), RepositoryError> {
        for tx in tx_list.list() {
            let savepoint = wsv.hash();
            match self.apply_tx(wsv, tx_history, tx, genesis) {
                Ok(()) => {}
                Err(
                    e @ (RepositoryError::TxRejected { .. }
                    | RepositoryError::TxFailed { .. }
                    | RepositoryError::TxUnverified { .. }),
                ) => {
                    if genesis {
                        return Err(e);
                    }
                    warn!("skipping transaction: {e}");
                    wsv.reset_to(&savepoint)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// One transaction: stateless signature check, then the stateful signer
    /// check (every authorizer account exists and its quorum of registered
    /// keys signed the payload), then validate + execute each command in
    /// order, then record the transaction. Commands within the transaction
    /// observe each other's staged writes. Genesis transactions bootstrap
    /// the very accounts they are signed by, so the stateful signer check
    /// only applies from block one on.
    fn apply_tx(
        &self,
        wsv: &mut Wsv,
        tx_history: &mut TxHistory,
        tx: &Transaction,
        genesis: bool,
    ) -> Result<(), RepositoryError> {
        let tx_hash = tx.hash(&*self.cryptor)?;
        if let Err(e) = tx.verify(&*self.cryptor) {
            return Err(RepositoryError::TxUnverified {
                tx_hash,
                detail: e.to_string(),
            });
        }
        if !genesis {
            match self
                .validator
                .validate_transaction(wsv, &*self.cryptor, tx)
            {
                Ok(()) => {}
                Err(CommandFailure::Validation(source)) => {
                    return Err(RepositoryError::TxRejected { tx_hash, source });
                }
                Err(CommandFailure::State(e)) => return Err(RepositoryError::State(e)),
            }
        }
        for command in &tx.payload.commands {
            match self.validator.validate(wsv, command) {
                Ok(()) => {}
                Err(CommandFailure::Validation(source)) => {
                    return Err(RepositoryError::TxRejected { tx_hash, source });
                }
                Err(CommandFailure::State(e)) => return Err(RepositoryError::State(e)),
            }
            self.executor
                .execute(wsv, command)
                .map_err(|source| RepositoryError::TxFailed {
                    tx_hash: tx_hash.clone(),
                    source,
                })?;
        }
        tx_history.append(tx)?;
        Ok(())
    }

    /// The pointer swap: adopt the views' working roots as durable state.
    fn publish(
        &self,
        wsv: &mut Wsv,
        tx_history: &mut TxHistory,
        blockchain: &mut Blockchain,
        block: Block,
    ) {
        wsv.commit();
        tx_history.commit();
        blockchain.commit();
        let mut state = self.state.write();
        state.wsv_root = Some(wsv.hash());
        state.tx_history_root = Some(tx_history.hash());
        state.blockchain_root = Some(blockchain.hash());
        state.top = Some(block);
    }
}

/// A snapshot of the chain's root pointers. Views opened through it stage
/// privately; the snapshot itself has nothing durable to undo, so `commit`
/// and `rollback` only mark the handle's end of life; the durable pointer
/// swap happens in [`Repository`].
pub struct RepositoryTx {
    store: Arc<dyn KeyValueStore>,
    cryptor: Arc<dyn Cryptor>,
    top: Option<Block>,
    wsv_root: Option<Hash>,
    tx_history_root: Option<Hash>,
    blockchain_root: Option<Hash>,
}

impl RepositoryTx {
    pub fn top(&self) -> Option<&Block> {
        self.top.as_ref()
    }

    pub fn wsv_root(&self) -> Option<&Hash> {
        self.wsv_root.as_ref()
    }

    pub fn tx_history_root(&self) -> Option<&Hash> {
        self.tx_history_root.as_ref()
    }

    pub fn blockchain_root(&self) -> Option<&Hash> {
        self.blockchain_root.as_ref()
    }

    /// World-state view at `root`; pass a historical hash for time travel or
    /// [`Self::wsv_root`] for the snapshot tip.
    pub fn wsv(&self, root: Option<&Hash>) -> Result<Wsv, MptError> {
        Wsv::open(Arc::clone(&self.store), Arc::clone(&self.cryptor), root)
    }

    pub fn tx_history(&self, root: Option<&Hash>) -> Result<TxHistory, MptError> {
        TxHistory::open(Arc::clone(&self.store), Arc::clone(&self.cryptor), root)
    }

    pub fn blockchain(&self, root: Option<&Hash>) -> Result<Blockchain, MptError> {
        Blockchain::open(Arc::clone(&self.store), Arc::clone(&self.cryptor), root)
    }

    pub fn commit(self) -> Result<(), RepositoryError> {
        Ok(())
    }

    pub fn rollback(self) {}
}
