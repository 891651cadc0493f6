// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::mock_state::MockState;
use crate::{CommandExecutor, CommandFailure, CommandValidator, ValidationErrorKind};
use std::collections::BTreeMap;
use themis_crypto::PublicKey;
use themis_types::{Account, Command, CommandKind, Object, ObjectFinder, Storage};

const SYSTEM: &str = "root@system";

fn test_key(n: u8) -> PublicKey {
    PublicKey::new(vec![n; 32])
}

fn account(id: &str, balance: i64, keys: Vec<PublicKey>, quorum: i32) -> Account {
    Account::builder()
        .account_id(id)
        .account_name(id.split('@').next().unwrap())
        .public_keys(keys)
        .quorum(quorum)
        .balance(balance)
        .build()
}

fn funded_state() -> MockState {
    let mut state = MockState::new();
    state.put(
        "alice@wonder",
        Object::Account(account("alice@wonder", 100, vec![test_key(1)], 1)),
    );
    state.put(
        "bob@wonder",
        Object::Account(account("bob@wonder", 0, vec![test_key(2)], 1)),
    );
    state
}

/// Validate-then-execute, the way the repository applies commands.
fn apply(state: &mut MockState, command: &Command) -> Result<(), CommandFailure> {
    let validator = CommandValidator::new(SYSTEM);
    validator.validate(state, command)?;
    CommandExecutor::new()
        .execute(state, command)
        .map_err(|e| CommandFailure::State(themis_types::FinderError::Backend(e.to_string())))
}

fn transfer(src: &str, dest: &str, balance: i64) -> Command {
    Command::new(
        src,
        src,
        CommandKind::TransferBalance {
            dest_account_id: dest.to_string(),
            balance,
        },
    )
}

fn balances(state: &MockState) -> (i64, i64) {
    (
        state.account("alice@wonder").unwrap().balance,
        state.account("bob@wonder").unwrap().balance,
    )
}

#[test]
fn transfer_moves_balance_and_preserves_the_sum() {
    let mut state = funded_state();
    apply(&mut state, &transfer("alice@wonder", "bob@wonder", 40)).unwrap();

    let (alice, bob) = balances(&state);
    assert_eq!((alice, bob), (60, 40));
    assert_eq!(alice + bob, 100);
}

#[test]
fn failed_validation_leaves_state_unchanged() {
    let mut state = funded_state();
    apply(&mut state, &transfer("alice@wonder", "bob@wonder", 40)).unwrap();

    let err = apply(&mut state, &transfer("alice@wonder", "bob@wonder", 70)).unwrap_err();
    match err {
        CommandFailure::Validation(e) => {
            assert_eq!(e.kind, ValidationErrorKind::InsufficientBalance)
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(balances(&state), (60, 40));
}

#[test]
fn create_account_starts_empty() {
    let mut state = funded_state();
    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "carol@wonder",
            CommandKind::CreateAccount {
                public_keys: vec![test_key(3), test_key(4)],
                quorum: 2,
            },
        ),
    )
    .unwrap();

    let carol = state.account("carol@wonder").unwrap();
    assert_eq!(carol.account_name, "carol");
    assert_eq!(carol.balance, 0);
    assert_eq!(carol.quorum, 2);
    assert_eq!(carol.public_keys.len(), 2);
    assert_eq!(carol.delegate_peer_id, "");
}

#[test]
fn key_rotation_respects_quorum() {
    let mut state = funded_state();
    let target = "alice@wonder";

    apply(
        &mut state,
        &Command::new(
            target,
            target,
            CommandKind::AddPublicKeys {
                public_keys: vec![test_key(11), test_key(12)],
            },
        ),
    )
    .unwrap();
    apply(
        &mut state,
        &Command::new(target, target, CommandKind::SetQuorum { quorum: 3 }),
    )
    .unwrap();

    // Removing any key now would drop below quorum.
    let err = apply(
        &mut state,
        &Command::new(
            target,
            target,
            CommandKind::RemovePublicKeys {
                public_keys: vec![test_key(12)],
            },
        ),
    )
    .unwrap_err();
    match err {
        CommandFailure::Validation(e) => assert_eq!(e.kind, ValidationErrorKind::QuorumOutOfRange),
        other => panic!("unexpected failure: {other:?}"),
    }

    let alice = state.account(target).unwrap();
    assert_eq!(alice.public_keys.len(), 3);
    assert_eq!(alice.quorum, 3);

    // Lowering quorum first makes the removal legal.
    apply(
        &mut state,
        &Command::new(target, target, CommandKind::SetQuorum { quorum: 1 }),
    )
    .unwrap();
    apply(
        &mut state,
        &Command::new(
            target,
            target,
            CommandKind::RemovePublicKeys {
                public_keys: vec![test_key(11), test_key(12)],
            },
        ),
    )
    .unwrap();
    assert_eq!(state.account(target).unwrap().public_keys, vec![test_key(1)]);
}

#[test]
fn peer_lifecycle_never_escapes_banned() {
    let mut state = funded_state();
    let add = Command::new(
        "alice@wonder",
        "node@peer",
        CommandKind::AddPeer {
            address: "127.0.0.1:50055".to_string(),
            public_key: test_key(7),
        },
    );
    apply(&mut state, &add).unwrap();
    let peer = state.peer("node@peer").unwrap();
    assert!(peer.active && !peer.banned);

    apply(
        &mut state,
        &Command::new("alice@wonder", "node@peer", CommandKind::SuspendPeer),
    )
    .unwrap();
    assert!(!state.peer("node@peer").unwrap().active);

    // Suspending a suspended peer is a no-op, not an error.
    apply(
        &mut state,
        &Command::new("alice@wonder", "node@peer", CommandKind::SuspendPeer),
    )
    .unwrap();

    apply(
        &mut state,
        &Command::new("alice@wonder", "node@peer", CommandKind::ActivatePeer),
    )
    .unwrap();
    assert!(state.peer("node@peer").unwrap().active);

    apply(
        &mut state,
        &Command::new("alice@wonder", "node@peer", CommandKind::BanPeer),
    )
    .unwrap();
    let peer = state.peer("node@peer").unwrap();
    assert!(peer.banned && !peer.active);

    // Every further transition is rejected and the flags stay put.
    for kind in [
        CommandKind::ActivatePeer,
        CommandKind::SuspendPeer,
        CommandKind::BanPeer,
    ] {
        let err = apply(
            &mut state,
            &Command::new("alice@wonder", "node@peer", kind),
        )
        .unwrap_err();
        match err {
            CommandFailure::Validation(e) => assert_eq!(e.kind, ValidationErrorKind::PeerBanned),
            other => panic!("unexpected failure: {other:?}"),
        }
    }
    let peer = state.peer("node@peer").unwrap();
    assert!(peer.banned && !peer.active);
}

#[test]
fn consign_sets_the_delegate() {
    let mut state = funded_state();
    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "node@peer",
            CommandKind::AddPeer {
                address: "127.0.0.1:50055".to_string(),
                public_key: test_key(7),
            },
        ),
    )
    .unwrap();
    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "alice@wonder",
            CommandKind::Consign {
                peer_id: "node@peer".to_string(),
            },
        ),
    )
    .unwrap();
    assert_eq!(state.account("alice@wonder").unwrap().delegate_peer_id, "node@peer");
}

#[test]
fn storage_lifecycle_end_to_end() {
    let mut state = funded_state();

    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "wallet",
            CommandKind::DefineStorage {
                storage: Storage::builder().int64("amount", 0).list("assets", vec![]).build(),
            },
        ),
    )
    .unwrap();

    for wallet in ["alice@wonder/wallet", "bob@wonder/wallet"] {
        apply(
            &mut state,
            &Command::new("alice@wonder", wallet, CommandKind::CreateStorage),
        )
        .unwrap();
    }
    let instance = state.storage("alice@wonder/wallet").unwrap();
    assert_eq!(instance.id, "alice@wonder/wallet");
    assert_eq!(instance.get("amount"), Some(&Object::Int64(0)));

    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "alice@wonder/wallet",
            CommandKind::UpdateObject {
                key: "amount".to_string(),
                object: Object::Int64(7),
            },
        ),
    )
    .unwrap();
    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "alice@wonder/wallet",
            CommandKind::AddObject {
                key: "assets".to_string(),
                object: Object::String("sword".to_string()),
            },
        ),
    )
    .unwrap();
    assert_eq!(
        state.storage("alice@wonder/wallet").unwrap().get("amount"),
        Some(&Object::Int64(7))
    );

    apply(
        &mut state,
        &Command::new(
            "alice@wonder",
            "alice@wonder/wallet",
            CommandKind::TransferObject {
                key: "assets".to_string(),
                dest_account_id: "bob@wonder".to_string(),
                object: Object::String("sword".to_string()),
            },
        ),
    )
    .unwrap();

    let alice_assets = state
        .storage("alice@wonder/wallet")
        .unwrap()
        .get("assets")
        .unwrap()
        .as_list()
        .unwrap()
        .clone();
    let bob_assets = state
        .storage("bob@wonder/wallet")
        .unwrap()
        .get("assets")
        .unwrap()
        .as_list()
        .unwrap()
        .clone();
    assert!(alice_assets.is_empty());
    assert_eq!(bob_assets, vec![Object::String("sword".to_string())]);
}

#[test]
fn system_commands_rewrite_storage() {
    let mut state = funded_state();
    state.put(
        "consensus",
        Object::Storage(
            Storage::builder()
                .id("consensus")
                .string("algo", "bft")
                .int64("round_limit", 4)
                .build(),
        ),
    );

    let mut variables = BTreeMap::new();
    variables.insert("round_limit".to_string(), Object::Int64(8));
    apply(
        &mut state,
        &Command::new(
            SYSTEM,
            "consensus",
            CommandKind::CheckAndCommitScript { variables },
        ),
    )
    .unwrap();
    let merged = state.storage("consensus").unwrap();
    assert_eq!(merged.get("round_limit"), Some(&Object::Int64(8)));
    assert_eq!(merged.get("algo"), Some(&Object::String("bft".to_string())));

    apply(
        &mut state,
        &Command::new(
            SYSTEM,
            "consensus",
            CommandKind::ForceUpdateStorage {
                storage: Storage::builder().string("algo", "raft").build(),
            },
        ),
    )
    .unwrap();
    let forced = state.storage("consensus").unwrap();
    assert_eq!(forced.get("algo"), Some(&Object::String("raft".to_string())));
    assert_eq!(forced.get("round_limit"), None);
    assert_eq!(forced.id, "consensus");
}
