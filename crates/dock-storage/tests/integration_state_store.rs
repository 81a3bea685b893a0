//! Integration tests for the file-backed state store.
//!
//! Run with: cargo test --package dock-storage --test integration_state_store

use dock_storage::{Database, DatabaseConfig, SqliteStateStore, StateStore};
use rstest::rstest;
use tempfile::TempDir;

#[tokio::test]
async fn test_value_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dock.db");

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let mut store = SqliteStateStore::new(db.pool().clone());
    store.store("device_state", 6).await.unwrap();
    db.close().await;

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let store = SqliteStateStore::new(db.pool().clone());
    assert_eq!(store.load("device_state").await.unwrap(), Some(6));
    db.close().await;
}

#[tokio::test]
async fn test_parent_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state").join("dock.db");

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    db.health_check().await.unwrap();
    assert!(path.exists());
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db.migrate().await.unwrap();
    db.health_check().await.unwrap();
}

#[tokio::test]
async fn test_missing_file_without_create_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.db");

    let result = Database::new(DatabaseConfig::new(&path).create_if_missing(false)).await;
    assert!(result.is_err());
}

#[rstest]
#[case("device_state", 0)]
#[case("device_state", 9)]
#[case("other_key", u32::MAX)]
#[tokio::test]
async fn test_store_and_load(#[case] key: &str, #[case] value: u32) {
    let db = Database::in_memory().await.unwrap();
    let mut store = SqliteStateStore::new(db.pool().clone());

    store.store(key, value).await.unwrap();
    assert_eq!(store.load(key).await.unwrap(), Some(value));
}

#[tokio::test]
async fn test_keys_are_independent() {
    let db = Database::in_memory().await.unwrap();
    let mut store = SqliteStateStore::new(db.pool().clone());

    store.store("a", 1).await.unwrap();
    store.store("b", 2).await.unwrap();

    assert_eq!(store.load("a").await.unwrap(), Some(1));
    assert_eq!(store.load("b").await.unwrap(), Some(2));
    assert_eq!(store.load("c").await.unwrap(), None);
}
