use super::{apply_increment, RemoteStore};
use crate::error::{StoreError, StoreResult};
use crate::model::{matches_all, Collection, Document, Fields, Filter};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Kinds of store call, used for fault injection and the call journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    Query,
    Insert,
    Delete,
    Increment,
    Update,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Get => "get",
            Op::Query => "query",
            Op::Insert => "insert",
            Op::Delete => "delete",
            Op::Increment => "increment",
            Op::Update => "update",
        };
        f.write_str(name)
    }
}

/// A simulated failure. Matches every call of `op` on `collection`
/// (and `field`, for increments/updates) until cleared, after letting the
/// first `skip` matching calls succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub op: Op,
    pub collection: Collection,
    pub field: Option<String>,
    pub skip: usize,
}

impl Fault {
    pub fn on(op: Op, collection: Collection) -> Self {
        Self {
            op,
            collection,
            field: None,
            skip: 0,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Let the first `calls` matching calls through.
    pub fn after(mut self, calls: usize) -> Self {
        self.skip = calls;
        self
    }

    fn matches(&self, op: Op, collection: Collection, field: Option<&str>) -> bool {
        self.op == op
            && self.collection == collection
            && match (&self.field, field) {
                (None, _) => true,
                (Some(want), Some(got)) => want == got,
                (Some(_), None) => false,
            }
    }
}

/// In-memory document store for tests and development.
///
/// Does NOT persist data. Documents sit behind a tokio mutex so the store can
/// be shared between tasks through an `Arc`; faults and the journal use a std
/// mutex since they are never held across an await.
#[derive(Default)]
pub struct MemStore {
    collections: Mutex<BTreeMap<Collection, BTreeMap<String, Fields>>>,
    faults: StdMutex<Vec<Fault>>,
    journal: StdMutex<Vec<(Op, Collection)>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every matching call fail with `StoreError::Unavailable`.
    pub fn fail(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Calls made so far, in order.
    pub fn journal(&self) -> Vec<(Op, Collection)> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_journal(&self) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Put a document in place without going through fault checks.
    /// Non-object values are stored as an empty document.
    pub async fn seed(&self, collection: Collection, id: &str, value: Value) {
        let fields = match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        self.collections
            .lock()
            .await
            .entry(collection)
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Snapshot of a collection, ordered by id.
    pub async fn documents(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .lock()
            .await
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check(&self, op: Op, collection: Collection, field: Option<&str>) -> StoreResult<()> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((op, collection));

        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let mut failed = false;
        for fault in faults
            .iter_mut()
            .filter(|f| f.matches(op, collection, field))
        {
            if fault.skip > 0 {
                fault.skip -= 1;
            } else {
                failed = true;
            }
        }
        if failed {
            return Err(StoreError::Unavailable(format!(
                "simulated {} failure on {}",
                op, collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        self.check(Op::Get, collection, None)?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        self.check(Op::Query, collection, None)?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| matches_all(filters, fields))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<String> {
        self.check(Op::Insert, collection, None)?;
        let id = Uuid::new_v4().to_string();
        self.collections
            .lock()
            .await
            .entry(collection)
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> StoreResult<bool> {
        self.check(Op::Insert, collection, None)?;
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), fields);
        Ok(true)
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.check(Op::Delete, collection, None)?;
        let mut collections = self.collections.lock().await;
        Ok(collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn delete_matching(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> StoreResult<usize> {
        self.check(Op::Delete, collection, None)?;
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, fields| !matches_all(filters, fields));
        Ok(before - docs.len())
    }

    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> StoreResult<()> {
        self.check(Op::Increment, collection, Some(field))?;
        let mut collections = self.collections.lock().await;
        let fields = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::DocumentMissing {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        apply_increment(collection, id, fields, field, delta)
    }

    async fn update_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> StoreResult<()> {
        self.check(Op::Update, collection, Some(field))?;
        let mut collections = self.collections.lock().await;
        let fields = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::DocumentMissing {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        fields.insert(field.to_string(), value);
        Ok(())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use serde_json::json;

    /// Builder seeding users, posts and comments the way the app would.
    pub struct StoreFixture {
        pub store: MemStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: MemStore::new(),
            }
        }

        pub async fn with_user(self, id: &str, full_name: &str) -> Self {
            self.store
                .seed(
                    Collection::Users,
                    id,
                    json!({
                        "fullName": full_name,
                        "usertag": format!("@{}", id),
                        "followerCount": 0,
                        "followingCount": 0,
                    }),
                )
                .await;
            self
        }

        pub async fn with_post(self, id: &str, owner: &str, like_count: i64) -> Self {
            self.store
                .seed(
                    Collection::Posts,
                    id,
                    json!({
                        "userId": owner,
                        "content": format!("post {}", id),
                        "likeCount": like_count,
                        "commentCount": 0,
                        "timestamp": "2024-01-01T00:00:00Z",
                    }),
                )
                .await;
            self
        }

        pub async fn with_comment(self, id: &str, post_id: &str, owner: &str) -> Self {
            self.store
                .seed(
                    Collection::Comments,
                    id,
                    json!({
                        "postId": post_id,
                        "userId": owner,
                        "content": format!("comment {}", id),
                        "likeCount": 0,
                        "timestamp": "2024-01-01T00:00:00Z",
                    }),
                )
                .await;
            self
        }
    }
}
