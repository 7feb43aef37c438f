//! Redis store tests.
//!
//! These need a live server and are ignored by default. Run them with
//! `KEY_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

use futures::future::join_all;
use key_service::store::{KeyStore, RedisKeyStore};
use key_service::{Key, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

async fn store() -> RedisKeyStore {
    let url = std::env::var("KEY_TEST_REDIS_URL").expect("KEY_TEST_REDIS_URL must be set");
    let namespace = format!("key-test-{}", Uuid::new_v4());
    RedisKeyStore::connect(&url, namespace).await.unwrap()
}

#[tokio::test]
#[ignore = "requires KEY_TEST_REDIS_URL"]
async fn test_insert_get_and_duplicate() {
    let store = store().await;

    store.insert(&Key::new("AB12")).await.unwrap();
    assert_eq!(store.get("AB12").await.unwrap(), Key::new("AB12"));
    assert_eq!(
        store.insert(&Key::new("AB12")).await,
        Err(StoreError::DuplicateId("AB12".to_string()))
    );
    assert_eq!(store.get("zzzz").await, Err(StoreError::NotFound));
}

#[tokio::test]
#[ignore = "requires KEY_TEST_REDIS_URL"]
async fn test_allocate_and_cancel_transitions() {
    let store = store().await;

    assert_eq!(store.allocate_one().await, Err(StoreError::NotFound));
    assert_eq!(store.list_unissued().await, Err(StoreError::NotFound));

    store.insert(&Key::new("k1")).await.unwrap();
    assert_eq!(store.cancel("k1").await, Err(StoreError::NotIssued));

    let key = store.allocate_one().await.unwrap();
    assert_eq!(key.id, "k1");
    assert!(key.issued);
    assert!(store.get("k1").await.unwrap().issued);

    store.cancel("k1").await.unwrap();
    assert_eq!(store.cancel("k1").await, Err(StoreError::AlreadyCanceled));
    assert_eq!(store.cancel("nope").await, Err(StoreError::NotFound));

    let stored = store.get("k1").await.unwrap();
    assert!(stored.issued && stored.canceled);
}

#[tokio::test]
#[ignore = "requires KEY_TEST_REDIS_URL"]
async fn test_insert_rejects_non_fresh_keys() {
    let store = store().await;
    let key = Key {
        id: "x".to_string(),
        issued: false,
        canceled: true,
    };

    assert!(matches!(store.insert(&key).await, Err(StoreError::Backend(_))));
    assert_eq!(store.get("x").await, Err(StoreError::NotFound));
}

#[tokio::test]
#[ignore = "requires KEY_TEST_REDIS_URL"]
async fn test_list_unissued_is_sorted() {
    let store = store().await;

    for id in ["c", "a", "b"] {
        store.insert(&Key::new(id)).await.unwrap();
    }

    let ids: Vec<String> = store
        .list_unissued()
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.id)
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires KEY_TEST_REDIS_URL"]
async fn test_concurrent_allocation_is_exclusive() {
    let store = store().await;
    let store = Arc::new(store);

    for i in 0..50 {
        store.insert(&Key::new(format!("key-{i}"))).await.unwrap();
    }

    let handles = (0..120).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.allocate_one().await })
    });
    let allocated: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| joined.unwrap().ok().map(|k| k.id))
        .collect();

    let distinct: HashSet<&String> = allocated.iter().collect();
    assert_eq!(allocated.len(), 50);
    assert_eq!(distinct.len(), 50);
}
