use super::{apply_increment, RemoteStore};
use crate::error::{StoreError, StoreResult};
use crate::model::{matches_all, Collection, Document, Fields, Filter};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

type CollectionData = BTreeMap<String, Fields>;

/// File-backed document store.
///
/// Each collection lives in `{root}/{collection}.json` as a map from document
/// id to fields. Every call loads the file, applies the change and writes it
/// back through a temp file + rename, so a crash never leaves a half-written
/// collection. A process-wide lock serializes calls; other processes are not
/// coordinated, which matches the "no cross-device locking" model of the core.
pub struct FsStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.as_str()))
    }

    async fn load(&self, collection: Collection) -> StoreResult<CollectionData> {
        let path = self.collection_path(collection);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(CollectionData::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CollectionData::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save(&self, collection: Collection, data: &CollectionData) -> StoreResult<()> {
        fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(data)?;

        // Atomic write
        let tmp = self
            .root
            .join(format!(".{}-{}.tmp", collection.as_str(), Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, self.collection_path(collection)).await?;
        Ok(())
    }

    fn missing(collection: Collection, id: &str) -> StoreError {
        StoreError::DocumentMissing {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for FsStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let _guard = self.lock.lock().await;
        let data = self.load(collection).await?;
        Ok(data.get(id).map(|fields| Document::new(id, fields.clone())))
    }

    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        let _guard = self.lock.lock().await;
        let data = self.load(collection).await?;
        Ok(data
            .into_iter()
            .filter(|(_, fields)| matches_all(filters, fields))
            .map(|(id, fields)| Document::new(id, fields))
            .collect())
    }

    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<String> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        let id = Uuid::new_v4().to_string();
        data.insert(id.clone(), fields);
        self.save(collection, &data).await?;
        Ok(id)
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> StoreResult<bool> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        if data.contains_key(id) {
            return Ok(false);
        }
        data.insert(id.to_string(), fields);
        self.save(collection, &data).await?;
        Ok(true)
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        if data.remove(id).is_none() {
            return Ok(false);
        }
        self.save(collection, &data).await?;
        Ok(true)
    }

    async fn delete_matching(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        let before = data.len();
        data.retain(|_, fields| !matches_all(filters, fields));
        let removed = before - data.len();
        if removed > 0 {
            self.save(collection, &data).await?;
        }
        Ok(removed)
    }

    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        let fields = data
            .get_mut(id)
            .ok_or_else(|| Self::missing(collection, id))?;
        apply_increment(collection, id, fields, field, delta)?;
        self.save(collection, &data).await
    }

    async fn update_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: Value,
    ) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load(collection).await?;
        let fields = data
            .get_mut(id)
            .ok_or_else(|| Self::missing(collection, id))?;
        fields.insert(field.to_string(), value);
        self.save(collection, &data).await
    }
}
