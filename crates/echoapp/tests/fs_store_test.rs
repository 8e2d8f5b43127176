use echoapp::model::{Collection, Fields, Filter};
use echoapp::store::fs::FsStore;
use echoapp::store::RemoteStore;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FsStore) {
    let dir = TempDir::new().unwrap();
    let store = FsStore::new(dir.path().join("data"));
    (dir, store)
}

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

#[tokio::test]
async fn test_fs_store_basic_document_io() {
    let (_dir, store) = setup();

    // 1. Write
    let id = store
        .insert(Collection::Posts, fields(json!({"userId": "bob", "likeCount": 0})))
        .await
        .unwrap();

    // 2. Read
    let doc = store.get(Collection::Posts, &id).await.unwrap().unwrap();
    assert_eq!(doc.str_field("userId"), Some("bob"));

    // 3. Delete
    assert!(store.delete(Collection::Posts, &id).await.unwrap());
    assert!(store.get(Collection::Posts, &id).await.unwrap().is_none());
    assert!(!store.delete(Collection::Posts, &id).await.unwrap());
}

#[tokio::test]
async fn test_fs_store_atomic_write_artifacts() {
    let (_dir, store) = setup();
    store
        .insert_if_absent(Collection::Likes, "l1", fields(json!({"userId": "a"})))
        .await
        .unwrap();

    let path = store.collection_path(Collection::Likes);
    assert!(path.exists());
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["l1"]["userId"], json!("a"));

    // Verify NO .tmp files are left behind
    for entry in fs::read_dir(store.root()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[tokio::test]
async fn test_fs_store_survives_reopen() {
    let (dir, store) = setup();
    store
        .insert_if_absent(Collection::Users, "bob", fields(json!({"followerCount": 1})))
        .await
        .unwrap();
    store
        .increment_field(Collection::Users, "bob", "followerCount", 2)
        .await
        .unwrap();
    drop(store);

    let reopened = FsStore::new(dir.path().join("data"));
    let doc = reopened
        .get(Collection::Users, "bob")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.counter("followerCount"), 3);
    assert!(!reopened
        .insert_if_absent(Collection::Users, "bob", Fields::new())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_fs_store_missing_collection_is_empty() {
    let (_dir, store) = setup();
    assert!(store
        .query(Collection::Notifications, &[])
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .delete_matching(Collection::Notifications, &[Filter::eq("senderId", "a")])
            .await
            .unwrap(),
        0
    );
    // Nothing was removed, so nothing was written.
    assert!(!store.collection_path(Collection::Notifications).exists());
}

#[tokio::test]
async fn test_fs_store_query_and_update() {
    let (_dir, store) = setup();
    for (id, recipient) in [("n1", "bob"), ("n2", "bob"), ("n3", "carol")] {
        store
            .insert_if_absent(
                Collection::Notifications,
                id,
                fields(json!({"recipientId": recipient, "read": false})),
            )
            .await
            .unwrap();
    }

    let bobs = store
        .query(Collection::Notifications, &[Filter::eq("recipientId", "bob")])
        .await
        .unwrap();
    assert_eq!(bobs.len(), 2);

    store
        .update_field(Collection::Notifications, "n1", "read", json!(true))
        .await
        .unwrap();
    let unread = store
        .query(
            Collection::Notifications,
            &[Filter::eq("recipientId", "bob"), Filter::eq("read", false)],
        )
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, "n2");
}

#[tokio::test]
async fn test_fs_store_increment_missing_document_fails() {
    let (_dir, store) = setup();
    assert!(store
        .increment_field(Collection::Posts, "nope", "likeCount", 1)
        .await
        .is_err());
}

#[tokio::test]
async fn test_fs_store_corrupt_file_is_an_error() {
    let (_dir, store) = setup();
    fs::create_dir_all(store.root()).unwrap();
    fs::write(store.collection_path(Collection::Likes), "{ not json").unwrap();
    assert!(store.query(Collection::Likes, &[]).await.is_err());
}
