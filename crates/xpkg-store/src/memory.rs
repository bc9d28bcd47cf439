use async_trait::async_trait;
use kube::core::DynamicObject;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{ObjectKey, ObjectStore, StoreError, StoreResult};

/// In-memory implementation for tests and dry runs.
///
/// Mirrors the API server where establishment depends on it: a `uid` and a
/// monotonically increasing `resourceVersion` are assigned on write, updates
/// carrying a stale `resourceVersion` are rejected with a conflict, and apply
/// leaves the stored `status` in place unless the submitted object sets one.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    objects: HashMap<ObjectKey, DynamicObject>,
    last_resource_version: u64,
    last_uid: u64,
}

impl StoreInner {
    fn next_resource_version(&mut self) -> String {
        self.last_resource_version += 1;
        self.last_resource_version.to_string()
    }

    fn next_uid(&mut self) -> String {
        self.last_uid += 1;
        format!("uid-{}", self.last_uid)
    }

    fn insert_new(&mut self, key: ObjectKey, object: &DynamicObject) -> DynamicObject {
        let mut stored = object.clone();
        if stored.metadata.uid.is_none() {
            stored.metadata.uid = Some(self.next_uid());
        }
        stored.metadata.resource_version = Some(self.next_resource_version());
        self.objects.insert(key, stored.clone());
        stored
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `objects`, as if each had been created.
    pub async fn seeded(
        objects: impl IntoIterator<Item = DynamicObject>,
    ) -> StoreResult<Self> {
        let store = Self::new();
        for object in objects {
            store.insert(object).await?;
        }
        Ok(store)
    }

    /// Stores `object` verbatim apart from server-assigned fields, replacing any
    /// existing copy. Unlike `apply`, a `status` is taken as given.
    pub async fn insert(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(&object)?;
        let mut inner = self.inner.write().await;
        Ok(inner.insert_new(key, &object))
    }

    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.inner.read().await.objects.contains_key(key)
    }

    /// Snapshot of every stored object, ordered by key.
    pub async fn objects(&self) -> Vec<DynamicObject> {
        let inner = self.inner.read().await;
        let mut entries: Vec<(&ObjectKey, &DynamicObject)> = inner.objects.iter().collect();
        entries.sort_by(|left, right| left.0.cmp(right.0));
        entries
            .into_iter()
            .map(|(_, object)| object.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<DynamicObject> {
        let inner = self.inner.read().await;
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn create(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        Ok(inner.insert_new(key, object))
    }

    async fn update(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.objects.get(&key) else {
            return Err(StoreError::NotFound(key));
        };

        if let Some(submitted) = object.metadata.resource_version.as_deref() {
            if existing.metadata.resource_version.as_deref() != Some(submitted) {
                return Err(StoreError::Conflict {
                    key,
                    message: format!(
                        "resourceVersion {submitted} is stale; current is {}",
                        existing.metadata.resource_version.as_deref().unwrap_or("none")
                    ),
                });
            }
        }

        let uid = existing.metadata.uid.clone();
        let mut stored = object.clone();
        stored.metadata.uid = uid;
        stored.metadata.resource_version = Some(inner.next_resource_version());
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn apply(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.objects.get(&key) else {
            let mut submitted = object.clone();
            strip_status(&mut submitted);
            return Ok(inner.insert_new(key, &submitted));
        };

        let mut stored = object.clone();
        stored.metadata.uid = existing.metadata.uid.clone();
        stored.metadata.creation_timestamp = existing.metadata.creation_timestamp.clone();
        stored.metadata.resource_version = existing.metadata.resource_version.clone();
        if let Some(status) = existing.data.get("status").cloned() {
            if let Some(fields) = stored.data.as_object_mut() {
                fields.insert("status".to_string(), status);
            }
        }

        if stored == *existing {
            return Ok(stored);
        }
        stored.metadata.resource_version = Some(inner.next_resource_version());
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

fn strip_status(object: &mut DynamicObject) {
    if let Some(fields) = object.data.as_object_mut() {
        fields.remove("status");
    }
}
