// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Object, Storage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use themis_crypto::PublicKey;

/// One mutation primitive. `authorizer_id` is the account issuing the
/// command; `target_id` names the entity acted upon (account id, peer id,
/// wallet id or storage definition id depending on the variant).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub authorizer_id: String,
    pub target_id: String,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(
        authorizer_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: CommandKind,
    ) -> Self {
        Command {
            authorizer_id: authorizer_id.into(),
            target_id: target_id.into(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Move `balance` from the target account to `dest_account_id`.
    TransferBalance {
        dest_account_id: String,
        balance: i64,
    },
    CreateAccount {
        public_keys: Vec<PublicKey>,
        quorum: i32,
    },
    AddBalance {
        balance: i64,
    },
    AddPublicKeys {
        public_keys: Vec<PublicKey>,
    },
    RemovePublicKeys {
        public_keys: Vec<PublicKey>,
    },
    SetQuorum {
        quorum: i32,
    },
    /// Register a storage definition under the target definition id.
    DefineStorage {
        storage: Storage,
    },
    /// Instantiate a defined storage under the target wallet id.
    CreateStorage,
    UpdateObject {
        key: String,
        object: Object,
    },
    /// Append `object` to the list stored under `key` of the target wallet.
    AddObject {
        key: String,
        object: Object,
    },
    /// Move `object` out of the target wallet's list into the same storage
    /// of `dest_account_id`.
    TransferObject {
        key: String,
        dest_account_id: String,
        object: Object,
    },
    AddPeer {
        address: String,
        public_key: PublicKey,
    },
    ActivatePeer,
    SuspendPeer,
    BanPeer,
    /// Delegate the target account to `peer_id`.
    Consign {
        peer_id: String,
    },
    /// System-only: re-commit the governance script storage at the target id
    /// with `variables` merged in.
    CheckAndCommitScript {
        variables: BTreeMap<String, Object>,
    },
    /// System-only: replace the target storage wholesale.
    ForceUpdateStorage {
        storage: Storage,
    },
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::TransferBalance { .. } => "TransferBalance",
            CommandKind::CreateAccount { .. } => "CreateAccount",
            CommandKind::AddBalance { .. } => "AddBalance",
            CommandKind::AddPublicKeys { .. } => "AddPublicKeys",
            CommandKind::RemovePublicKeys { .. } => "RemovePublicKeys",
            CommandKind::SetQuorum { .. } => "SetQuorum",
            CommandKind::DefineStorage { .. } => "DefineStorage",
            CommandKind::CreateStorage => "CreateStorage",
            CommandKind::UpdateObject { .. } => "UpdateObject",
            CommandKind::AddObject { .. } => "AddObject",
            CommandKind::TransferObject { .. } => "TransferObject",
            CommandKind::AddPeer { .. } => "AddPeer",
            CommandKind::ActivatePeer => "ActivatePeer",
            CommandKind::SuspendPeer => "SuspendPeer",
            CommandKind::BanPeer => "BanPeer",
            CommandKind::Consign { .. } => "Consign",
            CommandKind::CheckAndCommitScript { .. } => "CheckAndCommitScript",
            CommandKind::ForceUpdateStorage { .. } => "ForceUpdateStorage",
        }
    }
}
