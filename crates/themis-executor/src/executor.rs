// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::ExecutionError;
use std::collections::BTreeMap;
use themis_crypto::PublicKey;
use themis_types::ids::{parse_account_id, parse_wallet_id};
use themis_types::{
    Account, AccountBuilder, Command, CommandKind, Object, ObjectFinder, Peer, Storage,
    StorageBuilder,
};
use tracing::debug;

/// Applies validated commands by appending new object versions through the
/// finder. Reads observe earlier in-transaction appends, so command order
/// within a transaction is significant and preserved.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        CommandExecutor
    }

    pub fn execute(
        &self,
        finder: &mut dyn ObjectFinder,
        command: &Command,
    ) -> Result<(), ExecutionError> {
        debug!(command = command.name(), target = %command.target_id, "execute");
        let name = command.name();
        let target = command.target_id.as_str();
        match &command.kind {
            CommandKind::TransferBalance {
                dest_account_id,
                balance,
            } => self.transfer_balance(finder, name, target, dest_account_id, *balance),
            CommandKind::CreateAccount {
                public_keys,
                quorum,
            } => self.create_account(finder, name, target, public_keys, *quorum),
            CommandKind::AddBalance { balance } => {
                self.add_balance(finder, name, target, *balance)
            }
            CommandKind::AddPublicKeys { public_keys } => {
                self.add_public_keys(finder, target, public_keys)
            }
            CommandKind::RemovePublicKeys { public_keys } => {
                self.remove_public_keys(finder, target, public_keys)
            }
            CommandKind::SetQuorum { quorum } => self.set_quorum(finder, target, *quorum),
            CommandKind::DefineStorage { storage } => {
                self.define_storage(finder, target, storage)
            }
            CommandKind::CreateStorage => self.create_storage(finder, name, target),
            CommandKind::UpdateObject { key, object } => {
                self.update_object(finder, target, key, object)
            }
            CommandKind::AddObject { key, object } => {
                self.add_object(finder, name, target, key, object)
            }
            CommandKind::TransferObject {
                key,
                dest_account_id,
                object,
            } => self.transfer_object(finder, name, target, key, dest_account_id, object),
            CommandKind::AddPeer {
                address,
                public_key,
            } => self.add_peer(finder, target, address, public_key),
            CommandKind::ActivatePeer => self.set_peer_active(finder, target, true),
            CommandKind::SuspendPeer => self.set_peer_active(finder, target, false),
            CommandKind::BanPeer => self.ban_peer(finder, target),
            CommandKind::Consign { peer_id } => self.consign(finder, target, peer_id),
            CommandKind::CheckAndCommitScript { variables } => {
                self.check_and_commit_script(finder, target, variables)
            }
            CommandKind::ForceUpdateStorage { storage } => {
                self.force_update_storage(finder, target, storage)
            }
        }
    }

    fn transfer_balance(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
        dest_account_id: &str,
        balance: i64,
    ) -> Result<(), ExecutionError> {
        let src = finder.account(target)?;
        let dest = finder.account(dest_account_id)?;
        let src_balance = src
            .balance
            .checked_sub(balance)
            .ok_or_else(|| ExecutionError::invariant(name, "source balance underflow"))?;
        let dest_balance = dest
            .balance
            .checked_add(balance)
            .ok_or_else(|| ExecutionError::invariant(name, "destination balance overflow"))?;
        append_account(finder, AccountBuilder::from(src).balance(src_balance).build())?;
        append_account(finder, AccountBuilder::from(dest).balance(dest_balance).build())?;
        Ok(())
    }

    fn create_account(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
        public_keys: &[PublicKey],
        quorum: i32,
    ) -> Result<(), ExecutionError> {
        let (account_name, _) = parse_account_id(target)
            .ok_or_else(|| ExecutionError::invariant(name, "malformed account id"))?;
        let account = Account::builder()
            .account_id(target)
            .account_name(account_name)
            .public_keys(public_keys.to_vec())
            .quorum(quorum)
            .balance(0)
            .build();
        append_account(finder, account)
    }

    fn add_balance(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
        balance: i64,
    ) -> Result<(), ExecutionError> {
        let account = finder.account(target)?;
        let new_balance = account
            .balance
            .checked_add(balance)
            .ok_or_else(|| ExecutionError::invariant(name, "balance overflow"))?;
        append_account(
            finder,
            AccountBuilder::from(account).balance(new_balance).build(),
        )
    }

    fn add_public_keys(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        public_keys: &[PublicKey],
    ) -> Result<(), ExecutionError> {
        let account = finder.account(target)?;
        let mut keys = account.public_keys.clone();
        keys.extend(public_keys.iter().cloned());
        append_account(finder, AccountBuilder::from(account).public_keys(keys).build())
    }

    fn remove_public_keys(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        public_keys: &[PublicKey],
    ) -> Result<(), ExecutionError> {
        let account = finder.account(target)?;
        let keys: Vec<PublicKey> = account
            .public_keys
            .iter()
            .filter(|key| !public_keys.contains(*key))
            .cloned()
            .collect();
        append_account(finder, AccountBuilder::from(account).public_keys(keys).build())
    }

    fn set_quorum(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        quorum: i32,
    ) -> Result<(), ExecutionError> {
        let account = finder.account(target)?;
        append_account(finder, AccountBuilder::from(account).quorum(quorum).build())
    }

    fn define_storage(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        storage: &Storage,
    ) -> Result<(), ExecutionError> {
        let definition = StorageBuilder::from(storage.clone()).id(target).build();
        finder.append(target, Object::Storage(definition))?;
        Ok(())
    }

    fn create_storage(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
    ) -> Result<(), ExecutionError> {
        let (_, storage_id) = parse_wallet_id(target)
            .ok_or_else(|| ExecutionError::invariant(name, "malformed wallet id"))?;
        let definition = finder.storage(storage_id)?;
        let instance = StorageBuilder::from(definition).id(target).build();
        finder.append(target, Object::Storage(instance))?;
        Ok(())
    }

    fn update_object(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        key: &str,
        object: &Object,
    ) -> Result<(), ExecutionError> {
        let storage = finder.storage(target)?;
        let updated = StorageBuilder::from(storage).set(key, object.clone()).build();
        finder.append(target, Object::Storage(updated))?;
        Ok(())
    }

    fn add_object(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
        key: &str,
        object: &Object,
    ) -> Result<(), ExecutionError> {
        let storage = finder.storage(target)?;
        let mut list = list_entry(&storage, name, key)?;
        list.push(object.clone());
        let updated = StorageBuilder::from(storage).list(key, list).build();
        finder.append(target, Object::Storage(updated))?;
        Ok(())
    }

    fn transfer_object(
        &self,
        finder: &mut dyn ObjectFinder,
        name: &'static str,
        target: &str,
        key: &str,
        dest_account_id: &str,
        object: &Object,
    ) -> Result<(), ExecutionError> {
        let (_, storage_id) = parse_wallet_id(target)
            .ok_or_else(|| ExecutionError::invariant(name, "malformed wallet id"))?;
        let dest_wallet = format!("{dest_account_id}/{storage_id}");

        let src = finder.storage(target)?;
        let mut src_list = list_entry(&src, name, key)?;
        let position = src_list
            .iter()
            .position(|entry| entry == object)
            .ok_or_else(|| ExecutionError::invariant(name, "object vanished from source list"))?;
        src_list.remove(position);

        let dest = finder.storage(&dest_wallet)?;
        let mut dest_list = list_entry(&dest, name, key)?;
        dest_list.push(object.clone());

        finder.append(
            target,
            Object::Storage(StorageBuilder::from(src).list(key, src_list).build()),
        )?;
        finder.append(
            &dest_wallet,
            Object::Storage(StorageBuilder::from(dest).list(key, dest_list).build()),
        )?;
        Ok(())
    }

    fn add_peer(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        address: &str,
        public_key: &PublicKey,
    ) -> Result<(), ExecutionError> {
        let peer = Peer::new(target, address, public_key.clone());
        finder.append(target, Object::Peer(peer))?;
        Ok(())
    }

    fn set_peer_active(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        active: bool,
    ) -> Result<(), ExecutionError> {
        let peer = finder.peer(target)?;
        if peer.active == active {
            return Ok(());
        }
        finder.append(target, Object::Peer(Peer { active, ..peer }))?;
        Ok(())
    }

    fn ban_peer(&self, finder: &mut dyn ObjectFinder, target: &str) -> Result<(), ExecutionError> {
        let peer = finder.peer(target)?;
        finder.append(
            target,
            Object::Peer(Peer {
                active: false,
                banned: true,
                ..peer
            }),
        )?;
        Ok(())
    }

    fn consign(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        peer_id: &str,
    ) -> Result<(), ExecutionError> {
        let account = finder.account(target)?;
        append_account(
            finder,
            AccountBuilder::from(account).delegate_peer_id(peer_id).build(),
        )
    }

    fn check_and_commit_script(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        variables: &BTreeMap<String, Object>,
    ) -> Result<(), ExecutionError> {
        let storage = finder.storage(target)?;
        let mut builder = StorageBuilder::from(storage);
        for (key, object) in variables {
            builder = builder.set(key, object.clone());
        }
        finder.append(target, Object::Storage(builder.build()))?;
        Ok(())
    }

    fn force_update_storage(
        &self,
        finder: &mut dyn ObjectFinder,
        target: &str,
        storage: &Storage,
    ) -> Result<(), ExecutionError> {
        let forced = StorageBuilder::from(storage.clone()).id(target).build();
        finder.append(target, Object::Storage(forced))?;
        Ok(())
    }
}

fn append_account(
    finder: &mut dyn ObjectFinder,
    account: Account,
) -> Result<(), ExecutionError> {
    let id = account.account_id.clone();
    finder.append(&id, Object::Account(account))?;
    Ok(())
}

fn list_entry(
    storage: &Storage,
    name: &'static str,
    key: &str,
) -> Result<Vec<Object>, ExecutionError> {
    storage
        .get(key)
        .and_then(Object::as_list)
        .cloned()
        .ok_or_else(|| ExecutionError::invariant(name, format!("{key} does not hold a list")))
}
