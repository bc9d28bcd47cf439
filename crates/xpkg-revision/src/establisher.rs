use async_trait::async_trait;
use kube::core::DynamicObject;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use xpkg_store::{ObjectKey, ObjectStore, StoreError};
use xpkg_types::{establish_owner_reference, ParentIdentity, TypedReference};

#[derive(Debug, Error)]
pub enum EstablishError {
    #[error("parent {kind} '{name}' has no uid")]
    MissingParentUid { kind: String, name: String },
    #[error("cannot establish object: {0}")]
    InvalidObject(StoreError),
    #[error("cannot get object {key}: {error}")]
    Get { key: ObjectKey, error: StoreError },
    #[error("cannot create object {key}: {error}")]
    Create { key: ObjectKey, error: StoreError },
    #[error("cannot update object {key}: {error}")]
    Update { key: ObjectKey, error: StoreError },
}

impl EstablishError {
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::MissingParentUid { .. } => None,
            Self::InvalidObject(error)
            | Self::Get { error, .. }
            | Self::Create { error, .. }
            | Self::Update { error, .. } => Some(error),
        }
    }

    /// Key of the object being established when the failure happened.
    pub fn key(&self) -> Option<&ObjectKey> {
        match self {
            Self::MissingParentUid { .. } | Self::InvalidObject(_) => None,
            Self::Get { key, .. } | Self::Create { key, .. } | Self::Update { key, .. } => Some(key),
        }
    }
}

/// Brings a set of objects under the ownership or control of a parent.
#[async_trait]
pub trait Establisher: Send + Sync {
    /// Returns one reference per object, in submission order. Stops at the first
    /// failing object; objects before it keep whatever was written for them.
    /// A parent without a uid is rejected before any object is touched.
    async fn establish(
        &self,
        objects: &[DynamicObject],
        parent: &ParentIdentity,
        control: bool,
    ) -> Result<Vec<TypedReference>, EstablishError>;
}

/// Establisher that writes owner references through an [`ObjectStore`].
#[derive(Clone)]
pub struct ApiEstablisher {
    store: Arc<dyn ObjectStore>,
}

impl ApiEstablisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn establish_one(
        &self,
        key: &ObjectKey,
        object: &DynamicObject,
        parent: &ParentIdentity,
        control: bool,
    ) -> Result<(), EstablishError> {
        let mut current = match self.store.get(key).await {
            Ok(current) => current,
            Err(error) if error.is_not_found() => {
                let mut desired = object.clone();
                desired.metadata.owner_references = Some(vec![parent.owner_reference(control)]);
                self.store
                    .create(&desired)
                    .await
                    .map_err(|error| EstablishError::Create {
                        key: key.clone(),
                        error,
                    })?;
                debug!(object = %key, control, "created object under parent");
                return Ok(());
            }
            Err(error) => {
                return Err(EstablishError::Get {
                    key: key.clone(),
                    error,
                })
            }
        };

        let owners = current
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new);
        let change = establish_owner_reference(owners, parent, control);
        if !change.is_mutation() {
            debug!(object = %key, control, "owner reference already established");
            return Ok(());
        }

        self.store
            .update(&current)
            .await
            .map_err(|error| EstablishError::Update {
                key: key.clone(),
                error,
            })?;
        debug!(object = %key, control, change = ?change, "updated owner reference");
        Ok(())
    }
}

#[async_trait]
impl Establisher for ApiEstablisher {
    async fn establish(
        &self,
        objects: &[DynamicObject],
        parent: &ParentIdentity,
        control: bool,
    ) -> Result<Vec<TypedReference>, EstablishError> {
        if parent.uid.is_empty() {
            return Err(EstablishError::MissingParentUid {
                kind: parent.kind.clone(),
                name: parent.name.clone(),
            });
        }
        let mut references = Vec::with_capacity(objects.len());
        for object in objects {
            let key = ObjectKey::of(object).map_err(EstablishError::InvalidObject)?;
            self.establish_one(&key, object, parent, control).await?;
            references.push(TypedReference::new(key.name, key.namespace));
        }
        Ok(references)
    }
}
