//! Flat-file user store persistence

use chrono::{Duration, Utc};
use enrol_backend_lib::store::{FlatFileUserStore, NewUser, StoreError, UserStore};
use std::sync::Arc;
use tempfile::TempDir;

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "$scrypt$hash".to_string(),
        name: "A".to_string(),
        surname: "B".to_string(),
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let created = {
        let store = FlatFileUserStore::new(temp_dir.path()).unwrap();
        store.create_user(new_user("a@x.com")).await.unwrap()
    };

    let store = FlatFileUserStore::new(temp_dir.path()).unwrap();
    let by_email = store.find_by_email("A@x.COM").await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);
    let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "a@x.com");

    let err = store.create_user(new_user("a@X.com")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail(_)));
}

#[tokio::test]
async fn test_concurrent_creates_keep_one_record() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FlatFileUserStore::new(temp_dir.path()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create_user(new_user("race@x.com")).await.is_ok()
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_consumed_tokens_persist_until_purged() {
    let temp_dir = TempDir::new().unwrap();
    let store = FlatFileUserStore::new(temp_dir.path()).unwrap();
    let expires_at = Utc::now() + Duration::hours(1);

    assert!(store.consume_token("sig-1", expires_at).await.unwrap());
    assert!(!store.consume_token("sig-1", expires_at).await.unwrap());

    let reopened = FlatFileUserStore::new(temp_dir.path()).unwrap();
    assert!(reopened.is_token_consumed("sig-1").await.unwrap());

    assert_eq!(reopened.purge_consumed_tokens(Utc::now()).await.unwrap(), 0);
    assert_eq!(
        reopened
            .purge_consumed_tokens(expires_at + Duration::seconds(1))
            .await
            .unwrap(),
        1
    );
    assert!(!reopened.is_token_consumed("sig-1").await.unwrap());
}
