// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Account, Object, ObjectCode, Peer, Storage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("no object stored under {id}")]
    NotFound { id: String },

    #[error("object under {id} is {found:?}, expected {expected:?}")]
    UnexpectedKind {
        id: String,
        expected: ObjectCode,
        found: ObjectCode,
    },

    #[error("state backend failure: {0}")]
    Backend(String),
}

impl FinderError {
    pub fn not_found(id: impl Into<String>) -> Self {
        FinderError::NotFound { id: id.into() }
    }
}

/// Read/write access to the world state by id. The world-state view
/// implements this; validators and executors see nothing else, so command
/// logic stays independent of the tree underneath.
pub trait ObjectFinder {
    fn query(&self, target_id: &str) -> Result<Object, FinderError>;

    /// Stages a new version of the object stored under `target_id`.
    fn append(&mut self, target_id: &str, object: Object) -> Result<(), FinderError>;

    fn exists(&self, target_id: &str) -> Result<bool, FinderError> {
        match self.query(target_id) {
            Ok(_) => Ok(true),
            Err(FinderError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn account(&self, id: &str) -> Result<Account, FinderError> {
        match self.query(id)? {
            Object::Account(account) => Ok(account),
            other => Err(FinderError::UnexpectedKind {
                id: id.to_string(),
                expected: ObjectCode::Account,
                found: other.code(),
            }),
        }
    }

    fn peer(&self, id: &str) -> Result<Peer, FinderError> {
        match self.query(id)? {
            Object::Peer(peer) => Ok(peer),
            other => Err(FinderError::UnexpectedKind {
                id: id.to_string(),
                expected: ObjectCode::Peer,
                found: other.code(),
            }),
        }
    }

    fn storage(&self, id: &str) -> Result<Storage, FinderError> {
        match self.query(id)? {
            Object::Storage(storage) => Ok(storage),
            other => Err(FinderError::UnexpectedKind {
                id: id.to_string(),
                expected: ObjectCode::Storage,
                found: other.code(),
            }),
        }
    }
}
