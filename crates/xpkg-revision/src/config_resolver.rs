use async_trait::async_trait;
use std::sync::Arc;
use xpkg_store::{get_typed, ObjectKey, ObjectStore, StoreResult};
use xpkg_types::{ControllerConfig, PackageRevision, CONTROLLER_CONFIG_KIND, PKG_API_VERSION};

/// Looks up the controller config a revision refers to, if any.
#[async_trait]
pub trait ControllerConfigResolver: Send + Sync {
    async fn resolve(&self, revision: &PackageRevision) -> StoreResult<Option<ControllerConfig>>;
}

/// Resolves controller configs through an object store. A revision without a
/// reference resolves to `None`; a dangling reference is a not-found error.
#[derive(Clone)]
pub struct StoreControllerConfigResolver {
    store: Arc<dyn ObjectStore>,
}

impl StoreControllerConfigResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ControllerConfigResolver for StoreControllerConfigResolver {
    async fn resolve(&self, revision: &PackageRevision) -> StoreResult<Option<ControllerConfig>> {
        let Some(reference) = revision.controller_config_ref() else {
            return Ok(None);
        };
        let key = ObjectKey::new(
            PKG_API_VERSION,
            CONTROLLER_CONFIG_KIND,
            None,
            reference.name.clone(),
        );
        let config = get_typed::<ControllerConfig>(self.store.as_ref(), &key).await?;
        Ok(Some(config))
    }
}
