// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use themis_crypto::{Cryptor, Ed25519Sha256Cryptor, PrivateKey, PublicKey};
use themis_executor::{CommandExecutor, CommandValidator};
use themis_repository::{Repository, RepositoryError, TxHistory, TxList, Wsv};
use themis_store::MemoryStore;
use themis_types::{Object, ObjectFinder, Transaction};

const SYSTEM: &str = "root@system";
const AUTHORIZER: &str = "authorizer@com";

struct Keys {
    auth: (PublicKey, PrivateKey),
    account1: (PublicKey, PrivateKey),
    account2: (PublicKey, PrivateKey),
    peer: PublicKey,
}

fn new_keys(cryptor: &dyn Cryptor) -> Keys {
    Keys {
        auth: cryptor.new_key_pair(),
        account1: cryptor.new_key_pair(),
        account2: cryptor.new_key_pair(),
        peer: cryptor.new_key_pair().0,
    }
}

fn new_repository(cryptor: &Arc<Ed25519Sha256Cryptor>) -> Repository {
    Repository::new(
        Arc::new(MemoryStore::new()),
        cryptor.clone(),
        CommandValidator::new(SYSTEM),
        CommandExecutor::new(),
    )
}

fn genesis_tx(cryptor: &dyn Cryptor, keys: &Keys) -> Transaction {
    let mut tx = Transaction::builder()
        .created_time(0)
        .add_peer(AUTHORIZER, "root@peer", "127.0.0.1:50055", keys.peer.clone())
        .create_account(AUTHORIZER, AUTHORIZER, vec![keys.auth.0.clone()], 1)
        .create_account(AUTHORIZER, "account1@com", vec![keys.account1.0.clone()], 1)
        .create_account(AUTHORIZER, "account2@com", vec![keys.account2.0.clone()], 1)
        .add_balance(AUTHORIZER, "account1@com", 10_000)
        .build();
    tx.sign(cryptor, &keys.auth.0, &keys.auth.1).unwrap();
    tx
}

fn single_tx_list(cryptor: &Arc<Ed25519Sha256Cryptor>, tx: Transaction) -> TxList {
    let mut list = TxList::new(cryptor.clone());
    list.push(tx).unwrap();
    list
}

fn transfer_tx(
    cryptor: &dyn Cryptor,
    keys: &Keys,
    created_time: i64,
    amount: i64,
) -> Transaction {
    let mut tx = Transaction::builder()
        .created_time(created_time)
        .transfer_balance("account1@com", "account1@com", "account2@com", amount)
        .build();
    tx.sign(cryptor, &keys.account1.0, &keys.account1.1).unwrap();
    tx
}

/// Genesis plus handles for follow-up blocks.
fn bootstrapped() -> (Repository, Arc<Ed25519Sha256Cryptor>, Keys) {
    let cryptor = Arc::new(Ed25519Sha256Cryptor::new());
    let keys = new_keys(&*cryptor);
    let repo = new_repository(&cryptor);
    let list = single_tx_list(&cryptor, genesis_tx(&*cryptor, &keys));
    repo.genesis_commit(&list).unwrap();
    (repo, cryptor, keys)
}

fn balance(repo: &Repository, id: &str) -> i64 {
    let rtx = repo.begin();
    let wsv = rtx.wsv(rtx.wsv_root()).unwrap();
    wsv.account(id).unwrap().balance
}

#[test]
fn genesis_commit_is_reproducible() {
    let cryptor = Arc::new(Ed25519Sha256Cryptor::new());
    let keys = new_keys(&*cryptor);

    let repo_a = new_repository(&cryptor);
    let block_a = repo_a
        .genesis_commit(&single_tx_list(&cryptor, genesis_tx(&*cryptor, &keys)))
        .unwrap();

    let repo_b = new_repository(&cryptor);
    let block_b = repo_b
        .genesis_commit(&single_tx_list(&cryptor, genesis_tx(&*cryptor, &keys)))
        .unwrap();

    assert_eq!(block_a.payload.wsv_hash, block_b.payload.wsv_hash);
    assert_eq!(
        block_a.hash(&*cryptor).unwrap(),
        block_b.hash(&*cryptor).unwrap()
    );

    assert_eq!(balance(&repo_a, "account1@com"), 10_000);
    let rtx = repo_a.begin();
    let wsv = rtx.wsv(rtx.wsv_root()).unwrap();
    let peer = wsv.peer("root@peer").unwrap();
    assert!(peer.active && !peer.banned);
    assert_eq!(peer.address, "127.0.0.1:50055");
}

#[test]
fn genesis_commit_happens_once() {
    let (repo, cryptor, keys) = bootstrapped();
    let err = repo
        .genesis_commit(&single_tx_list(&cryptor, genesis_tx(&*cryptor, &keys)))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::AlreadyInitialized));
}

#[test]
fn commit_without_genesis_is_rejected() {
    let cryptor = Arc::new(Ed25519Sha256Cryptor::new());
    let keys = new_keys(&*cryptor);
    let repo = new_repository(&cryptor);
    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 1, 1));
    let err = repo.propose(&list, 1, 0).unwrap_err();
    assert!(matches!(err, RepositoryError::EmptyChain));
}

#[test]
fn propose_then_commit_applies_a_transfer() {
    let (repo, cryptor, keys) = bootstrapped();

    let tx = transfer_tx(&*cryptor, &keys, 10, 40);
    let tx_hash = tx.hash(&*cryptor).unwrap();
    let list = single_tx_list(&cryptor, tx.clone());

    let block = repo.propose(&list, 10, 0).unwrap();
    repo.commit(block.clone(), &list).unwrap();

    assert_eq!(repo.top().unwrap(), block);
    assert_eq!(balance(&repo, "account1@com"), 9_960);
    assert_eq!(balance(&repo, "account2@com"), 40);

    // The applied transaction is in the history under its hash.
    let rtx = repo.begin();
    let history = rtx.tx_history(rtx.tx_history_root()).unwrap();
    assert_eq!(history.query(&tx_hash).unwrap(), tx);
}

#[test]
fn over_budget_transfer_is_skipped_and_leaves_state_alone() {
    let (repo, cryptor, keys) = bootstrapped();

    // Drain most of the balance, then try to overdraw.
    let ok_tx = transfer_tx(&*cryptor, &keys, 20, 9_940);
    let list = single_tx_list(&cryptor, ok_tx);
    let block = repo.propose(&list, 20, 0).unwrap();
    repo.commit(block, &list).unwrap();
    assert_eq!(balance(&repo, "account1@com"), 60);

    let overdraw = transfer_tx(&*cryptor, &keys, 21, 70);
    let overdraw_hash = overdraw.hash(&*cryptor).unwrap();
    let list = single_tx_list(&cryptor, overdraw);
    let block = repo.propose(&list, 21, 0).unwrap();

    // The proposer skipped the transaction, so the header carries the
    // untouched roots and commit agrees with it.
    let before = repo.top().unwrap().payload.wsv_hash.clone();
    assert_eq!(block.payload.wsv_hash, before);
    repo.commit(block, &list).unwrap();

    assert_eq!(balance(&repo, "account1@com"), 60);
    assert_eq!(balance(&repo, "account2@com"), 9_940);

    let rtx = repo.begin();
    let history = rtx.tx_history(rtx.tx_history_root()).unwrap();
    assert!(history.query(&overdraw_hash).is_err());
}

#[test]
fn foreign_signature_cannot_author_a_transfer() {
    let (repo, cryptor, _keys) = bootstrapped();

    // A perfectly valid Ed25519 signature, but from a key that was never
    // registered for the authorizing account.
    let (foreign_pk, foreign_sk) = cryptor.new_key_pair();
    let mut tx = Transaction::builder()
        .created_time(25)
        .transfer_balance("account1@com", "account1@com", "account2@com", 40)
        .build();
    tx.sign(&*cryptor, &foreign_pk, &foreign_sk).unwrap();
    let tx_hash = tx.hash(&*cryptor).unwrap();
    let list = single_tx_list(&cryptor, tx);

    // The proposer rejects the transaction for missing account1's quorum,
    // so the header carries the untouched roots and commit agrees.
    let before = repo.top().unwrap().payload.wsv_hash.clone();
    let block = repo.propose(&list, 25, 0).unwrap();
    assert_eq!(block.payload.wsv_hash, before);
    repo.commit(block, &list).unwrap();

    assert_eq!(balance(&repo, "account1@com"), 10_000);
    assert_eq!(balance(&repo, "account2@com"), 0);

    let rtx = repo.begin();
    let history = rtx.tx_history(rtx.tx_history_root()).unwrap();
    assert!(history.query(&tx_hash).is_err());
}

#[test]
fn unknown_authorizer_cannot_author_anything() {
    let (repo, cryptor, keys) = bootstrapped();

    // Signed with a registered key, but the authorizing account was never
    // created.
    let mut tx = Transaction::builder()
        .created_time(26)
        .transfer_balance("ghost@com", "ghost@com", "account2@com", 1)
        .build();
    tx.sign(&*cryptor, &keys.account1.0, &keys.account1.1)
        .unwrap();
    let list = single_tx_list(&cryptor, tx);

    let before = repo.top().unwrap().payload.wsv_hash.clone();
    let block = repo.propose(&list, 26, 0).unwrap();
    assert_eq!(block.payload.wsv_hash, before);
    repo.commit(block, &list).unwrap();
    assert_eq!(balance(&repo, "account2@com"), 0);
}

#[test]
fn commit_rejects_a_doctored_header() {
    let (repo, cryptor, keys) = bootstrapped();
    let top_before = repo.top().unwrap();

    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 30, 10));
    let mut block = repo.propose(&list, 30, 0).unwrap();
    block.payload.wsv_hash = themis_crypto::Hash::new(vec![0xab; 32]);

    let err = repo.commit(block, &list).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::HeaderMismatch { field: "wsv_hash" }
    ));
    assert_eq!(repo.top().unwrap(), top_before);
    assert_eq!(balance(&repo, "account1@com"), 10_000);
}

#[test]
fn commit_rejects_bad_linkage() {
    let (repo, cryptor, keys) = bootstrapped();

    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 40, 10));
    let mut block = repo.propose(&list, 40, 0).unwrap();
    block.payload.height = 5;
    assert!(matches!(
        repo.commit(block, &list).unwrap_err(),
        RepositoryError::HeightMismatch { .. }
    ));

    let mut block = repo.propose(&list, 40, 0).unwrap();
    block.payload.pre_block_hash = themis_crypto::Hash::new(vec![0xcd; 32]);
    assert!(matches!(
        repo.commit(block, &list).unwrap_err(),
        RepositoryError::DetachedBlock
    ));
}

#[test]
fn historical_roots_reflect_their_block() {
    let (repo, cryptor, keys) = bootstrapped();
    let genesis = repo.top().unwrap();

    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 50, 40));
    let b1 = repo.propose(&list, 50, 0).unwrap();
    repo.commit(b1.clone(), &list).unwrap();

    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 51, 60));
    let b2 = repo.propose(&list, 51, 0).unwrap();
    repo.commit(b2.clone(), &list).unwrap();
    assert_eq!(balance(&repo, "account1@com"), 9_900);

    // A view opened at B1's world-state root ignores everything after B1.
    let rtx = repo.begin();
    let wsv_b1 = rtx.wsv(Some(&b1.payload.wsv_hash)).unwrap();
    assert_eq!(wsv_b1.account("account1@com").unwrap().balance, 9_960);
    let wsv_genesis = rtx.wsv(Some(&genesis.payload.wsv_hash)).unwrap();
    assert_eq!(wsv_genesis.account("account1@com").unwrap().balance, 10_000);

    // Committed blocks are reachable by hash.
    let blockchain = rtx.blockchain(rtx.blockchain_root()).unwrap();
    assert_eq!(
        blockchain.get(&genesis.hash(&*cryptor).unwrap()).unwrap(),
        genesis
    );
    assert_eq!(blockchain.get(&b1.hash(&*cryptor).unwrap()).unwrap(), b1);
}

#[test]
fn account_history_walks_newest_first() {
    let (repo, cryptor, keys) = bootstrapped();

    let list = single_tx_list(&cryptor, transfer_tx(&*cryptor, &keys, 60, 40));
    let block = repo.propose(&list, 60, 0).unwrap();
    repo.commit(block, &list).unwrap();

    let rtx = repo.begin();
    let wsv = rtx.wsv(rtx.wsv_root()).unwrap();
    let versions = wsv.query_history("account1@com").unwrap();
    let balances: Vec<i64> = versions
        .iter()
        .map(|object| object.as_account().unwrap().balance)
        .collect();
    // Transfer, funding, creation.
    assert_eq!(balances, vec![9_960, 10_000, 0]);
}

#[test]
fn range_query_enumerates_accounts_under_a_prefix() {
    let (repo, _cryptor, _keys) = bootstrapped();

    let rtx = repo.begin();
    let wsv = rtx.wsv(rtx.wsv_root()).unwrap();
    let objects = wsv.query_range("account").unwrap();
    let mut ids: Vec<String> = objects
        .iter()
        .map(|object| object.as_account().unwrap().account_id.clone())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["account1@com".to_string(), "account2@com".to_string()]);

    assert!(wsv.query_range("storage").unwrap().is_empty());
}

#[test]
fn wsv_rollback_discards_staged_appends() {
    let cryptor: Arc<dyn Cryptor> = Arc::new(Ed25519Sha256Cryptor::new());
    let store = Arc::new(MemoryStore::new());
    let mut wsv = Wsv::open(store, cryptor, None).unwrap();
    let empty_root = wsv.hash();

    wsv.append_object("ghost@com", &Object::String("staged".to_string()))
        .unwrap();
    assert_ne!(wsv.hash(), empty_root);

    wsv.rollback().unwrap();
    assert_eq!(wsv.hash(), empty_root);
    assert!(wsv.query_object("ghost@com").is_err());

    wsv.append_object("kept@com", &Object::String("kept".to_string()))
        .unwrap();
    wsv.commit();
    assert_eq!(wsv.stable_hash(), &wsv.hash());
}

#[test]
fn tx_history_append_is_idempotent() {
    let cryptor: Arc<dyn Cryptor> = Arc::new(Ed25519Sha256Cryptor::new());
    let store = Arc::new(MemoryStore::new());
    let mut history = TxHistory::open(store, Arc::clone(&cryptor), None).unwrap();

    let tx = Transaction::builder()
        .created_time(9)
        .add_balance("a@b", "a@b", 5)
        .build();
    history.append(&tx).unwrap();
    let root = history.hash();

    history.append(&tx).unwrap();
    assert_eq!(history.hash(), root);

    let tx_hash = tx.hash(&*cryptor).unwrap();
    assert_eq!(history.query(&tx_hash).unwrap(), tx);
}
