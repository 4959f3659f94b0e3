//! End-to-end scenarios that exercise the real kernel keyring but stop short of a controlling
//! terminal: cache hit/miss, revoke, and wrong-salt `Undecipherable`.

use memento::store::{KeyName, RecallResult, Salt, Store};

use serial_test::serial;
use std::time::Duration;

fn open(key: &str, salt: &Salt) -> Store {
    let name = KeyName::new("memento-tests", key, None);
    Store::new(name, key.as_bytes(), salt, Some(Duration::from_secs(60))).unwrap()
}

#[test]
#[serial]
fn recall_after_memorise_returns_the_same_memento() {
    let store = open("dispatch-hit", &Salt::none());
    store.forget().unwrap();

    store.memorise(b"hunter2").unwrap();
    match store.recall().unwrap() {
        RecallResult::Present(bytes) => assert_eq!(bytes, b"hunter2"),
        other => panic!("expected Present, got {:?}", other),
    }

    store.forget().unwrap();
}

#[test]
#[serial]
fn recall_with_no_prior_memorise_is_absent() {
    let store = open("dispatch-miss", &Salt::none());
    store.forget().unwrap();

    match store.recall().unwrap() {
        RecallResult::Absent => {}
        other => panic!("expected Absent, got {:?}", other),
    }
}

#[test]
#[serial]
fn second_memorise_supersedes_the_first() {
    let store = open("dispatch-update", &Salt::none());
    store.forget().unwrap();

    store.memorise(b"first").unwrap();
    store.memorise(b"second").unwrap();

    match store.recall().unwrap() {
        RecallResult::Present(bytes) => assert_eq!(bytes, b"second"),
        other => panic!("expected Present, got {:?}", other),
    }

    store.forget().unwrap();
}

#[test]
#[serial]
fn forget_is_idempotent() {
    let store = open("dispatch-forget", &Salt::none());
    store.forget().unwrap();
    store.forget().unwrap();
}

#[test]
#[serial]
fn wrong_salt_is_undecipherable_not_absent() {
    let key = "dispatch-salt";
    let writer = open(key, &Salt::from_bytes(b"correct-salt".to_vec()));
    writer.forget().unwrap();
    writer.memorise(b"hunter2").unwrap();

    let reader = open(key, &Salt::from_bytes(b"wrong-salt".to_vec()));
    match reader.recall().unwrap() {
        RecallResult::Undecipherable => {}
        other => panic!("expected Undecipherable, got {:?}", other),
    }

    writer.forget().unwrap();
}
