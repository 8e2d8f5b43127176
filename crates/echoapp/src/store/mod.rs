//! # Storage Layer
//!
//! This module defines the storage abstraction for echo. The [`RemoteStore`]
//! trait is the only way the core touches persisted state, so the same
//! coordinators run against a hosted document store, the JSON files used by the
//! CLI, or the in-memory store used in tests.
//!
//! ## What the Store Guarantees
//!
//! Every method is a single remote operation. There are **no multi-document
//! transactions**: a like touches the `likes` collection, a counter on a post
//! and a notification as three independent writes. The only atomicity the core
//! relies on is per call:
//!
//! - `increment_field` is an atomic signed add on one field. Counters are never
//!   written as absolute values computed client-side, so concurrent writers
//!   commute instead of clobbering each other.
//! - `insert_if_absent` either creates the document under the given id or
//!   reports that it already existed. This is what makes edge creation
//!   idempotent.
//!
//! ## Operations
//!
//! | Operation | Used for |
//! |-----------|----------|
//! | `get` | Re-fetching counters, resolving target owners and sender profiles |
//! | `query` | Edge membership, notification lookups, reconciliation scans |
//! | `insert` | Comments and comment notifications (store-assigned ids) |
//! | `insert_if_absent` | Edges and like/follow notifications (deterministic ids) |
//! | `delete` | Reconciliation of single orphaned notifications |
//! | `delete_matching` | Unlike/unfollow and notification removal |
//! | `increment_field` | All counter maintenance |
//! | `update_field` | Marking notifications read |
//!
//! An empty filter slice matches every document in the collection.
//!
//! ## Implementations
//!
//! - [`memory::MemStore`]: In-memory, with fault injection for tests.
//! - [`fs::FsStore`]: One JSON file per collection, written atomically.

use crate::error::StoreResult;
use crate::model::{Collection, Document, Fields, Filter};
use async_trait::async_trait;
use serde_json::Value;

pub mod fs;
pub mod memory;

/// Async document interface over named collections.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    /// Equality-filter query.
    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>>;

    /// Insert under a fresh store-assigned id, returning that id.
    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<String>;

    /// Insert under `id` unless a document with that id exists.
    /// Returns `true` if this call created the document.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> StoreResult<bool>;

    /// Delete one document. Returns `true` if it existed.
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Delete every document matching `filters`, returning how many went away.
    async fn delete_matching(&self, collection: Collection, filters: &[Filter])
        -> StoreResult<usize>;

    /// Atomically add `delta` to an integer field. A missing field counts as 0;
    /// a missing document or an out-of-range result is an error.
    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> StoreResult<()>;

    /// Overwrite a single field of an existing document.
    async fn update_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> StoreResult<()>;
}

/// Shared add-to-integer logic for backends that hold fields in memory.
pub(crate) fn apply_increment(
    collection: Collection,
    id: &str,
    fields: &mut Fields,
    field: &str,
    delta: i64,
) -> StoreResult<()> {
    let current = match fields.get(field) {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| crate::error::StoreError::NotAnInteger {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
            })?,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| crate::error::StoreError::CounterOverflow {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
        })?;
    fields.insert(field.to_string(), Value::from(next));
    Ok(())
}
