// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Command, CommandKind, Object, Signature, Storage, TypesError, to_canonical_bytes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use themis_crypto::{Cryptor, Hash, PrivateKey, PublicKey};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxPayload {
    pub created_time: i64,
    pub commands: Vec<Command>,
}

/// An ordered command list plus the signatures authorizing it. The
/// transaction hash covers the payload only, so signing does not move the
/// hash used to key the transaction history.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub payload: TxPayload,
    pub signatures: Vec<Signature>,
}

impl Transaction {
    pub fn builder() -> TxBuilder {
        TxBuilder::default()
    }

    pub fn hash(&self, cryptor: &dyn Cryptor) -> Result<Hash, TypesError> {
        Ok(cryptor.hash(&to_canonical_bytes(&self.payload)?))
    }

    /// Appends a signature over the payload hash.
    pub fn sign(
        &mut self,
        cryptor: &dyn Cryptor,
        public_key: &PublicKey,
        private_key: &PrivateKey,
    ) -> Result<(), TypesError> {
        let hash = self.hash(cryptor)?;
        let signature = cryptor.sign(hash.as_ref(), private_key)?;
        self.signatures
            .push(Signature::new(public_key.clone(), signature));
        Ok(())
    }

    /// Stateless check: at least one signature, and every carried signature
    /// verifies against the payload hash. Quorum against account state is a
    /// separate, stateful concern.
    pub fn verify(&self, cryptor: &dyn Cryptor) -> Result<(), TypesError> {
        if self.signatures.is_empty() {
            return Err(TypesError::Unsigned);
        }
        let hash = self.hash(cryptor)?;
        for signature in &self.signatures {
            cryptor.verify(&signature.public_key, hash.as_ref(), &signature.signature)?;
        }
        Ok(())
    }
}

/// Accumulates commands into a transaction, one method per primitive.
#[derive(Default)]
pub struct TxBuilder {
    payload: TxPayload,
}

impl TxBuilder {
    pub fn created_time(mut self, time: i64) -> Self {
        self.payload.created_time = time;
        self
    }

    pub fn append_command(mut self, command: Command) -> Self {
        self.payload.commands.push(command);
        self
    }

    pub fn transfer_balance(
        self,
        authorizer_id: &str,
        src_account_id: &str,
        dest_account_id: &str,
        balance: i64,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            src_account_id,
            CommandKind::TransferBalance {
                dest_account_id: dest_account_id.to_string(),
                balance,
            },
        ))
    }

    pub fn create_account(
        self,
        authorizer_id: &str,
        account_id: &str,
        public_keys: Vec<PublicKey>,
        quorum: i32,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::CreateAccount {
                public_keys,
                quorum,
            },
        ))
    }

    pub fn add_balance(self, authorizer_id: &str, account_id: &str, balance: i64) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::AddBalance { balance },
        ))
    }

    pub fn add_public_keys(
        self,
        authorizer_id: &str,
        account_id: &str,
        public_keys: Vec<PublicKey>,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::AddPublicKeys { public_keys },
        ))
    }

    pub fn remove_public_keys(
        self,
        authorizer_id: &str,
        account_id: &str,
        public_keys: Vec<PublicKey>,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::RemovePublicKeys { public_keys },
        ))
    }

    pub fn set_quorum(self, authorizer_id: &str, account_id: &str, quorum: i32) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::SetQuorum { quorum },
        ))
    }

    pub fn define_storage(self, authorizer_id: &str, storage_id: &str, storage: Storage) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            storage_id,
            CommandKind::DefineStorage { storage },
        ))
    }

    pub fn create_storage(self, authorizer_id: &str, wallet_id: &str) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            wallet_id,
            CommandKind::CreateStorage,
        ))
    }

    pub fn update_object(
        self,
        authorizer_id: &str,
        wallet_id: &str,
        key: &str,
        object: Object,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            wallet_id,
            CommandKind::UpdateObject {
                key: key.to_string(),
                object,
            },
        ))
    }

    pub fn add_object(
        self,
        authorizer_id: &str,
        wallet_id: &str,
        key: &str,
        object: Object,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            wallet_id,
            CommandKind::AddObject {
                key: key.to_string(),
                object,
            },
        ))
    }

    pub fn transfer_object(
        self,
        authorizer_id: &str,
        wallet_id: &str,
        dest_account_id: &str,
        key: &str,
        object: Object,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            wallet_id,
            CommandKind::TransferObject {
                key: key.to_string(),
                dest_account_id: dest_account_id.to_string(),
                object,
            },
        ))
    }

    pub fn add_peer(
        self,
        authorizer_id: &str,
        peer_id: &str,
        address: &str,
        public_key: PublicKey,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            peer_id,
            CommandKind::AddPeer {
                address: address.to_string(),
                public_key,
            },
        ))
    }

    pub fn activate_peer(self, authorizer_id: &str, peer_id: &str) -> Self {
        self.append_command(Command::new(authorizer_id, peer_id, CommandKind::ActivatePeer))
    }

    pub fn suspend_peer(self, authorizer_id: &str, peer_id: &str) -> Self {
        self.append_command(Command::new(authorizer_id, peer_id, CommandKind::SuspendPeer))
    }

    pub fn ban_peer(self, authorizer_id: &str, peer_id: &str) -> Self {
        self.append_command(Command::new(authorizer_id, peer_id, CommandKind::BanPeer))
    }

    pub fn consign(self, authorizer_id: &str, account_id: &str, peer_id: &str) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            account_id,
            CommandKind::Consign {
                peer_id: peer_id.to_string(),
            },
        ))
    }

    pub fn check_and_commit_script(
        self,
        authorizer_id: &str,
        script_id: &str,
        variables: BTreeMap<String, Object>,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            script_id,
            CommandKind::CheckAndCommitScript { variables },
        ))
    }

    pub fn force_update_storage(
        self,
        authorizer_id: &str,
        target_id: &str,
        storage: Storage,
    ) -> Self {
        self.append_command(Command::new(
            authorizer_id,
            target_id,
            CommandKind::ForceUpdateStorage { storage },
        ))
    }

    pub fn build(self) -> Transaction {
        Transaction {
            payload: self.payload,
            signatures: Vec::new(),
        }
    }
}
