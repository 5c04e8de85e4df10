use std::time::Duration;

use skald::{FileStore, KvStore, StoreError};

const TTL: Duration = Duration::from_secs(60);

#[tokio::test]
async fn put_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    store.put("narrative-v1-abc", "{}".into(), TTL).await.unwrap();
    assert_eq!(
        store.get("narrative-v1-abc").await.unwrap().as_deref(),
        Some("{}")
    );

    store.delete("narrative-v1-abc").await.unwrap();
    assert_eq!(store.get("narrative-v1-abc").await.unwrap(), None);
    // Deleting a missing key is not an error.
    store.delete("narrative-v1-abc").await.unwrap();
}

#[tokio::test]
async fn overwrite_replaces_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.put("k", "one".into(), TTL).await.unwrap();
    store.put("k", "two".into(), TTL).await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
}

#[tokio::test]
async fn directory_is_created_on_first_write() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("skald").join("artifacts");
    let store = FileStore::new(&nested);

    assert!(store.keys().await.unwrap().is_empty());
    assert_eq!(store.get("k").await.unwrap(), None);

    store.put("k", "v".into(), TTL).await.unwrap();
    assert!(nested.is_dir());
    assert_eq!(store.dir(), nested.as_path());
}

#[tokio::test]
async fn keys_skip_foreign_and_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    store.put("a", "1".into(), TTL).await.unwrap();
    store.put("b", "2".into(), TTL).await.unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
    std::fs::write(dir.path().join(".a.1.0.tmp"), "x").unwrap();

    let mut keys = store.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn clear_removes_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    for key in ["a", "b", "c"] {
        store.put(key, "v".into(), TTL).await.unwrap();
    }
    store.clear().await.unwrap();
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsafe_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    for key in ["", "../escape", "a/b", "a.b"] {
        let err = store.put(key, "v".into(), TTL).await.unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)), "{key:?}");
    }
}

#[tokio::test]
async fn entries_survive_a_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    FileStore::new(dir.path())
        .put("k", "persisted".into(), TTL)
        .await
        .unwrap();
    let reopened = FileStore::new(dir.path());
    assert_eq!(
        reopened.get("k").await.unwrap().as_deref(),
        Some("persisted")
    );
}
