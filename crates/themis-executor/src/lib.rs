// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command validation and execution over the world state.
//!
//! [`CommandValidator`] checks a command's preconditions without mutating
//! anything; [`CommandExecutor`] applies a validated command by staging new
//! object versions through an [`ObjectFinder`](themis_types::ObjectFinder).
//! Running the validator and then the executor is equivalent to running the
//! executor alone when validation passes; when it fails, state is untouched.

mod executor;
mod validator;

#[cfg(test)]
mod executor_test;
#[cfg(test)]
pub(crate) mod mock_state;

pub use executor::CommandExecutor;
pub use validator::CommandValidator;

use themis_types::FinderError;
use thiserror::Error;

/// One kind per command precondition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationErrorKind {
    NotFoundAccount,
    NotFoundDestAccount,
    NotFoundPeer,
    NotFoundStorage,
    NotFoundStorageKey,
    NotFoundPublicKey,
    NotFoundObject,
    DuplicateAccount,
    DuplicatePeer,
    DuplicateStorage,
    DuplicatePublicKey,
    DuplicateObject,
    InsufficientBalance,
    NegativeAmount,
    BalanceOverflow,
    QuorumOutOfRange,
    QuorumNotSatisfied,
    EmptyPublicKeys,
    PeerBanned,
    PeerInactive,
    MalformedId,
    ObjectKindMismatch,
    NotAuthorized,
    PermissionDenied,
}

#[derive(Debug, Error)]
#[error("{command} rejected ({kind:?}): {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub command: &'static str,
    pub detail: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, command: &'static str, detail: impl Into<String>) -> Self {
        ValidationError {
            kind,
            command,
            detail: detail.into(),
        }
    }
}

/// Validation outcome: either a verdict about the command, or trouble
/// reaching the state itself (which is not a verdict and aborts the block).
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("state access failed during validation: {0}")]
    State(#[from] FinderError),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("state access failed during execution: {0}")]
    State(#[from] FinderError),

    #[error("execution invariant broken in {command}: {detail}")]
    Invariant {
        command: &'static str,
        detail: String,
    },
}

impl ExecutionError {
    pub(crate) fn invariant(command: &'static str, detail: impl Into<String>) -> Self {
        ExecutionError::Invariant {
            command,
            detail: detail.into(),
        }
    }
}
