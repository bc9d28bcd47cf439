//! Object store abstractions with in-memory and Kubernetes API backends.

use async_trait::async_trait;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

mod kubernetes;
mod memory;

pub use kubernetes::KubeObjectStore;
pub use memory::InMemoryObjectStore;

/// Result type for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Address of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace,
            name: name.into(),
        }
    }

    /// Key for a k8s-openapi resource type.
    pub fn for_resource<K: k8s_openapi::Resource>(
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            K::API_VERSION,
            K::KIND,
            namespace.map(str::to_string),
            name,
        )
    }

    /// Derives the key of a dynamic object from its type and metadata.
    pub fn of(object: &DynamicObject) -> StoreResult<Self> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| StoreError::InvalidObject("object has no apiVersion/kind".into()))?;
        let name = object
            .metadata
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                StoreError::InvalidObject(format!("{} object has no name", types.kind))
            })?;
        Ok(Self::new(
            types.api_version.clone(),
            types.kind.clone(),
            object.metadata.namespace.clone(),
            name,
        ))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(
                f,
                "{} '{}/{}' ({})",
                self.kind, namespace, self.name, self.api_version
            ),
            None => write!(f, "{} '{}' ({})", self.kind, self.name, self.api_version),
        }
    }
}

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),
    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),
    #[error("conflict writing {key}: {message}")]
    Conflict { key: ObjectKey, message: String },
    #[error("api server returned {code}: {message}")]
    Api { code: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid object: {0}")]
    InvalidObject(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true when a later attempt may succeed without any input change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::Conflict { .. } => true,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::Transport(_) => true,
            Self::InvalidObject(_) | Self::Serde(_) => false,
        }
    }
}

/// Maps a not-found result to `None`.
pub fn ignore_not_found<T>(result: StoreResult<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_not_found() => Ok(None),
        Err(error) => Err(error),
    }
}

/// Async object store contract consumed by establishment and activation.
///
/// Implementations own retry, timeout and optimistic-concurrency behaviour; a
/// stale write surfaces as [`StoreError::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> StoreResult<DynamicObject>;
    async fn create(&self, object: &DynamicObject) -> StoreResult<DynamicObject>;
    async fn update(&self, object: &DynamicObject) -> StoreResult<DynamicObject>;
    async fn delete(&self, key: &ObjectKey) -> StoreResult<()>;
    /// Creates the object or converges the stored copy to it.
    async fn apply(&self, object: &DynamicObject) -> StoreResult<DynamicObject>;
}

/// Converts a typed object into its dynamic form.
pub fn to_dynamic<T: Serialize>(object: &T) -> StoreResult<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Converts a dynamic object into a typed one.
pub fn from_dynamic<T: DeserializeOwned>(object: &DynamicObject) -> StoreResult<T> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &ObjectKey,
) -> StoreResult<T> {
    let object = store.get(key).await?;
    from_dynamic(&object)
}

/// Applies a typed object and returns the stored result in the same type.
pub async fn apply_typed<T: Serialize + DeserializeOwned>(
    store: &dyn ObjectStore,
    object: &T,
) -> StoreResult<T> {
    let applied = store.apply(&to_dynamic(object)?).await?;
    from_dynamic(&applied)
}
