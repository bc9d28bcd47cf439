use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;

use crate::{ObjectKey, ObjectStore, StoreError, StoreResult};

/// Object store backed by a Kubernetes API server.
///
/// `apply` is server-side apply under the configured field manager, forcing
/// ownership of conflicting fields.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
    field_manager: String,
}

impl KubeObjectStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    pub fn field_manager(&self) -> &str {
        &self.field_manager
    }

    fn api(&self, key: &ObjectKey) -> Api<DynamicObject> {
        let (group, version) = split_api_version(&key.api_version);
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, &key.kind));
        match key.namespace.as_deref() {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rfind('/') {
        Some(index) => (&api_version[..index], &api_version[index + 1..]),
        None => ("", api_version),
    }
}

fn map_kube_error(key: &ObjectKey, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound(key.clone()),
        kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(key.clone())
        }
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            key: key.clone(),
            message: response.message,
        },
        kube::Error::Api(response) => StoreError::Api {
            code: response.code,
            message: response.message,
        },
        other => StoreError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<DynamicObject> {
        self.api(key)
            .get(&key.name)
            .await
            .map_err(|error| map_kube_error(key, error))
    }

    async fn create(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        self.api(&key)
            .create(&PostParams::default(), object)
            .await
            .map_err(|error| map_kube_error(&key, error))
    }

    async fn update(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        self.api(&key)
            .replace(&key.name, &PostParams::default(), object)
            .await
            .map_err(|error| map_kube_error(&key, error))
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.api(key)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|error| map_kube_error(key, error))
    }

    async fn apply(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        let key = ObjectKey::of(object)?;
        let params = PatchParams::apply(&self.field_manager).force();
        tracing::debug!(object = %key, field_manager = %self.field_manager, "server-side apply");
        self.api(&key)
            .patch(&key.name, &params, &Patch::Apply(object))
            .await
            .map_err(|error| map_kube_error(&key, error))
    }
}
