// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{CommandFailure, ValidationError, ValidationErrorKind};
use std::collections::BTreeSet;
use themis_crypto::{Cryptor, PublicKey};
use themis_types::ids::{parse_account_id, parse_wallet_id};
use themis_types::{
    Account, Command, CommandKind, FinderError, Object, ObjectFinder, Peer, Storage, Transaction,
};

use ValidationErrorKind::*;

/// Pure precondition checks, one per command variant. Nothing here mutates
/// state; a passing command is safe to hand to the executor.
pub struct CommandValidator {
    system_authorizer: String,
}

impl CommandValidator {
    /// `system_authorizer` is the only account allowed to issue
    /// CheckAndCommitScript and ForceUpdateStorage.
    pub fn new(system_authorizer: impl Into<String>) -> Self {
        CommandValidator {
            system_authorizer: system_authorizer.into(),
        }
    }

    pub fn validate(
        &self,
        finder: &dyn ObjectFinder,
        command: &Command,
    ) -> Result<(), CommandFailure> {
        let name = command.name();
        let target = command.target_id.as_str();
        match &command.kind {
            CommandKind::TransferBalance {
                dest_account_id,
                balance,
            } => self.validate_transfer_balance(finder, command, dest_account_id, *balance),
            CommandKind::CreateAccount {
                public_keys,
                quorum,
            } => self.validate_create_account(finder, name, target, public_keys, *quorum),
            CommandKind::AddBalance { balance } => {
                self.validate_add_balance(finder, name, target, *balance)
            }
            CommandKind::AddPublicKeys { public_keys } => {
                self.validate_add_public_keys(finder, name, target, public_keys)
            }
            CommandKind::RemovePublicKeys { public_keys } => {
                self.validate_remove_public_keys(finder, name, target, public_keys)
            }
            CommandKind::SetQuorum { quorum } => {
                self.validate_set_quorum(finder, name, target, *quorum)
            }
            CommandKind::DefineStorage { .. } => self.validate_define_storage(finder, name, target),
            CommandKind::CreateStorage => self.validate_create_storage(finder, name, target),
            CommandKind::UpdateObject { key, object } => {
                self.validate_update_object(finder, name, target, key, object)
            }
            CommandKind::AddObject { key, object } => {
                self.validate_add_object(finder, name, target, key, object)
            }
            CommandKind::TransferObject {
                key,
                dest_account_id,
                object,
            } => self.validate_transfer_object(finder, name, target, key, dest_account_id, object),
            CommandKind::AddPeer { .. } => self.validate_add_peer(finder, name, target),
            CommandKind::ActivatePeer | CommandKind::SuspendPeer | CommandKind::BanPeer => {
                self.validate_peer_transition(finder, name, target)
            }
            CommandKind::Consign { peer_id } => {
                self.validate_consign(finder, name, target, peer_id)
            }
            CommandKind::CheckAndCommitScript { .. } => {
                self.require_system_authorizer(command)?;
                require_storage(finder, name, target).map(|_| ())
            }
            CommandKind::ForceUpdateStorage { .. } => self.require_system_authorizer(command),
        }
    }

    /// Stateful transaction admission: every authorizer account must exist
    /// and the transaction must carry at least `quorum` valid signatures by
    /// that account's keys.
    pub fn validate_transaction(
        &self,
        finder: &dyn ObjectFinder,
        cryptor: &dyn Cryptor,
        tx: &Transaction,
    ) -> Result<(), CommandFailure> {
        let hash = tx
            .hash(cryptor)
            .map_err(|e| CommandFailure::State(FinderError::Backend(e.to_string())))?;
        let authorizers: BTreeSet<&str> = tx
            .payload
            .commands
            .iter()
            .map(|command| command.authorizer_id.as_str())
            .collect();
        for authorizer in authorizers {
            let account = find_account(finder, authorizer)?.ok_or_else(|| {
                ValidationError::new(
                    NotFoundAccount,
                    "Transaction",
                    format!("authorizer {authorizer} does not exist"),
                )
            })?;
            let valid = tx
                .signatures
                .iter()
                .filter(|signature| {
                    account.has_public_key(&signature.public_key)
                        && cryptor
                            .verify(&signature.public_key, hash.as_ref(), &signature.signature)
                            .is_ok()
                })
                .count();
            if (valid as i64) < i64::from(account.quorum) {
                return Err(ValidationError::new(
                    QuorumNotSatisfied,
                    "Transaction",
                    format!(
                        "authorizer {authorizer} provided {valid} valid signatures, quorum is {}",
                        account.quorum
                    ),
                )
                .into());
            }
        }
        Ok(())
    }

    fn validate_transfer_balance(
        &self,
        finder: &dyn ObjectFinder,
        command: &Command,
        dest_account_id: &str,
        balance: i64,
    ) -> Result<(), CommandFailure> {
        let name = command.name();
        if command.authorizer_id != command.target_id {
            return Err(ValidationError::new(
                NotAuthorized,
                name,
                format!(
                    "authorizer {} cannot move funds of {}",
                    command.authorizer_id, command.target_id
                ),
            )
            .into());
        }
        if balance < 0 {
            return Err(ValidationError::new(
                NegativeAmount,
                name,
                format!("amount {balance} is negative"),
            )
            .into());
        }
        let src = find_account(finder, &command.target_id)?.ok_or_else(|| {
            ValidationError::new(NotFoundAccount, name, command.target_id.as_str())
        })?;
        let dest = find_account(finder, dest_account_id)?.ok_or_else(|| {
            ValidationError::new(NotFoundDestAccount, name, dest_account_id)
        })?;
        if src.balance < balance {
            return Err(ValidationError::new(
                InsufficientBalance,
                name,
                format!("balance {} cannot cover {balance}", src.balance),
            )
            .into());
        }
        if dest.balance.checked_add(balance).is_none() {
            return Err(ValidationError::new(
                BalanceOverflow,
                name,
                format!("destination balance {} overflows", dest.balance),
            )
            .into());
        }
        Ok(())
    }

    fn validate_create_account(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        public_keys: &[PublicKey],
        quorum: i32,
    ) -> Result<(), CommandFailure> {
        if parse_account_id(target).is_none() {
            return Err(ValidationError::new(
                MalformedId,
                name,
                format!("{target} is not of the form name@domain"),
            )
            .into());
        }
        if exists(finder, target)? {
            return Err(ValidationError::new(DuplicateAccount, name, target).into());
        }
        check_quorum_range(name, quorum, public_keys.len())?;
        Ok(())
    }

    fn validate_add_balance(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        balance: i64,
    ) -> Result<(), CommandFailure> {
        if balance < 0 {
            return Err(ValidationError::new(
                NegativeAmount,
                name,
                format!("amount {balance} is negative"),
            )
            .into());
        }
        let account = find_account(finder, target)?
            .ok_or_else(|| ValidationError::new(NotFoundAccount, name, target))?;
        if account.balance.checked_add(balance).is_none() {
            return Err(ValidationError::new(
                BalanceOverflow,
                name,
                format!("balance {} overflows by {balance}", account.balance),
            )
            .into());
        }
        Ok(())
    }

    fn validate_add_public_keys(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        public_keys: &[PublicKey],
    ) -> Result<(), CommandFailure> {
        if public_keys.is_empty() {
            return Err(ValidationError::new(EmptyPublicKeys, name, target).into());
        }
        let account = find_account(finder, target)?
            .ok_or_else(|| ValidationError::new(NotFoundAccount, name, target))?;
        for key in public_keys {
            if account.has_public_key(key) {
                return Err(ValidationError::new(
                    DuplicatePublicKey,
                    name,
                    format!("{key:?} is already registered"),
                )
                .into());
            }
        }
        Ok(())
    }

    fn validate_remove_public_keys(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        public_keys: &[PublicKey],
    ) -> Result<(), CommandFailure> {
        if public_keys.is_empty() {
            return Err(ValidationError::new(EmptyPublicKeys, name, target).into());
        }
        let account = find_account(finder, target)?
            .ok_or_else(|| ValidationError::new(NotFoundAccount, name, target))?;
        for key in public_keys {
            if !account.has_public_key(key) {
                return Err(ValidationError::new(
                    NotFoundPublicKey,
                    name,
                    format!("{key:?} is not registered"),
                )
                .into());
            }
        }
        let remaining = account.public_keys.len() - public_keys.len();
        if (remaining as i64) < i64::from(account.quorum) {
            return Err(ValidationError::new(
                QuorumOutOfRange,
                name,
                format!(
                    "{remaining} keys would remain below quorum {}",
                    account.quorum
                ),
            )
            .into());
        }
        Ok(())
    }

    fn validate_set_quorum(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        quorum: i32,
    ) -> Result<(), CommandFailure> {
        let account = find_account(finder, target)?
            .ok_or_else(|| ValidationError::new(NotFoundAccount, name, target))?;
        check_quorum_range(name, quorum, account.public_keys.len())?;
        Ok(())
    }

    fn validate_define_storage(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
    ) -> Result<(), CommandFailure> {
        if target.is_empty() {
            return Err(ValidationError::new(MalformedId, name, "empty definition id").into());
        }
        if exists(finder, target)? {
            return Err(ValidationError::new(DuplicateStorage, name, target).into());
        }
        Ok(())
    }

    fn validate_create_storage(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
    ) -> Result<(), CommandFailure> {
        let (account_id, storage_id) = parse_wallet_id(target).ok_or_else(|| {
            ValidationError::new(
                MalformedId,
                name,
                format!("{target} is not of the form name@domain/storage"),
            )
        })?;
        if find_account(finder, account_id)?.is_none() {
            return Err(ValidationError::new(NotFoundAccount, name, account_id).into());
        }
        if find_storage(finder, storage_id)?.is_none() {
            return Err(ValidationError::new(
                NotFoundStorage,
                name,
                format!("no definition under {storage_id}"),
            )
            .into());
        }
        if exists(finder, target)? {
            return Err(ValidationError::new(DuplicateStorage, name, target).into());
        }
        Ok(())
    }

    fn validate_update_object(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        key: &str,
        object: &Object,
    ) -> Result<(), CommandFailure> {
        let storage = require_storage(finder, name, target)?;
        let declared = storage
            .get(key)
            .ok_or_else(|| ValidationError::new(NotFoundStorageKey, name, key))?;
        if declared.code() != object.code() {
            return Err(ValidationError::new(
                ObjectKindMismatch,
                name,
                format!("{key} holds {:?}, got {:?}", declared.code(), object.code()),
            )
            .into());
        }
        Ok(())
    }

    fn validate_add_object(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        key: &str,
        object: &Object,
    ) -> Result<(), CommandFailure> {
        let storage = require_storage(finder, name, target)?;
        let list = require_list(&storage, name, key)?;
        if list.contains(object) {
            return Err(ValidationError::new(
                DuplicateObject,
                name,
                format!("object already present under {key}"),
            )
            .into());
        }
        Ok(())
    }

    fn validate_transfer_object(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        key: &str,
        dest_account_id: &str,
        object: &Object,
    ) -> Result<(), CommandFailure> {
        let storage = require_storage(finder, name, target)?;
        let list = require_list(&storage, name, key)?;
        if !list.contains(object) {
            return Err(ValidationError::new(
                NotFoundObject,
                name,
                format!("object not present under {key}"),
            )
            .into());
        }
        if find_account(finder, dest_account_id)?.is_none() {
            return Err(ValidationError::new(NotFoundDestAccount, name, dest_account_id).into());
        }
        let (_, storage_id) = parse_wallet_id(target).ok_or_else(|| {
            ValidationError::new(MalformedId, name, format!("{target} is not a wallet id"))
        })?;
        let dest_wallet = format!("{dest_account_id}/{storage_id}");
        if find_storage(finder, &dest_wallet)?.is_none() {
            return Err(ValidationError::new(NotFoundStorage, name, dest_wallet).into());
        }
        Ok(())
    }

    fn validate_add_peer(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
    ) -> Result<(), CommandFailure> {
        if parse_account_id(target).is_none() {
            return Err(ValidationError::new(
                MalformedId,
                name,
                format!("{target} is not of the form name@domain"),
            )
            .into());
        }
        if exists(finder, target)? {
            return Err(ValidationError::new(DuplicatePeer, name, target).into());
        }
        Ok(())
    }

    /// Activate, suspend and ban share the same preconditions: the peer
    /// exists and has not reached the terminal banned state.
    fn validate_peer_transition(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
    ) -> Result<(), CommandFailure> {
        let peer = find_peer(finder, target)?
            .ok_or_else(|| ValidationError::new(NotFoundPeer, name, target))?;
        if peer.banned {
            return Err(ValidationError::new(PeerBanned, name, target).into());
        }
        Ok(())
    }

    fn validate_consign(
        &self,
        finder: &dyn ObjectFinder,
        name: &'static str,
        target: &str,
        peer_id: &str,
    ) -> Result<(), CommandFailure> {
        if find_account(finder, target)?.is_none() {
            return Err(ValidationError::new(NotFoundAccount, name, target).into());
        }
        let peer = find_peer(finder, peer_id)?
            .ok_or_else(|| ValidationError::new(NotFoundPeer, name, peer_id))?;
        if peer.banned {
            return Err(ValidationError::new(PeerBanned, name, peer_id).into());
        }
        if !peer.active {
            return Err(ValidationError::new(PeerInactive, name, peer_id).into());
        }
        Ok(())
    }

    fn require_system_authorizer(&self, command: &Command) -> Result<(), CommandFailure> {
        if command.authorizer_id != self.system_authorizer {
            return Err(ValidationError::new(
                PermissionDenied,
                command.name(),
                format!("{} is not the system authorizer", command.authorizer_id),
            )
            .into());
        }
        Ok(())
    }
}

fn check_quorum_range(
    name: &'static str,
    quorum: i32,
    key_count: usize,
) -> Result<(), CommandFailure> {
    if quorum < 1 || (i64::from(quorum)) > key_count as i64 {
        return Err(ValidationError::new(
            QuorumOutOfRange,
            name,
            format!("quorum {quorum} with {key_count} keys"),
        )
        .into());
    }
    Ok(())
}

fn require_storage(
    finder: &dyn ObjectFinder,
    name: &'static str,
    target: &str,
) -> Result<Storage, CommandFailure> {
    find_storage(finder, target)?
        .ok_or_else(|| ValidationError::new(NotFoundStorage, name, target).into())
}

fn require_list<'a>(
    storage: &'a Storage,
    name: &'static str,
    key: &str,
) -> Result<&'a Vec<Object>, CommandFailure> {
    let entry = storage
        .get(key)
        .ok_or_else(|| ValidationError::new(NotFoundStorageKey, name, key))?;
    entry.as_list().ok_or_else(|| {
        ValidationError::new(
            ObjectKindMismatch,
            name,
            format!("{key} holds {:?}, expected List", entry.code()),
        )
        .into()
    })
}

fn exists(finder: &dyn ObjectFinder, id: &str) -> Result<bool, CommandFailure> {
    finder.exists(id).map_err(CommandFailure::State)
}

fn find_account(
    finder: &dyn ObjectFinder,
    id: &str,
) -> Result<Option<Account>, CommandFailure> {
    match finder.account(id) {
        Ok(account) => Ok(Some(account)),
        Err(FinderError::NotFound { .. }) => Ok(None),
        Err(e) => Err(CommandFailure::State(e)),
    }
}

fn find_peer(finder: &dyn ObjectFinder, id: &str) -> Result<Option<Peer>, CommandFailure> {
    match finder.peer(id) {
        Ok(peer) => Ok(Some(peer)),
        Err(FinderError::NotFound { .. }) => Ok(None),
        Err(e) => Err(CommandFailure::State(e)),
    }
}

fn find_storage(
    finder: &dyn ObjectFinder,
    id: &str,
) -> Result<Option<Storage>, CommandFailure> {
    match finder.storage(id) {
        Ok(storage) => Ok(Some(storage)),
        Err(FinderError::NotFound { .. }) => Ok(None),
        Err(e) => Err(CommandFailure::State(e)),
    }
}
