//! Activation hooks run around child-object establishment.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use xpkg_store::{apply_typed, ignore_not_found, ObjectKey, ObjectStore, StoreError};
use xpkg_types::{
    DesiredState, PackageKind, PackageMeta, PackageRevision, ProviderMeta, Reference,
    RevisionKind,
};

use crate::config_resolver::{ControllerConfigResolver, StoreControllerConfigResolver};
use crate::workload::{DefaultWorkloadBuilder, Workload, WorkloadBuilder};

const DEPLOYMENT_AVAILABLE: &str = "Available";

/// Failure of a `pre` or `post` hook. Every display string starts with the
/// variant's [`HookError::classification`].
#[derive(Debug, Error)]
pub enum HookError {
    #[error("not a provider package: got {}", .0.as_str())]
    NotProvider(PackageKind),
    #[error("not a provider revision: got {}", .0.as_str())]
    NotProviderRevision(RevisionKind),
    #[error("not a configuration package: got {}", .0.as_str())]
    NotConfiguration(PackageKind),
    #[error("cannot get referenced controller config: {0}")]
    ControllerConfig(StoreError),
    #[error("cannot delete provider package deployment: {0}")]
    DeleteDeployment(StoreError),
    #[error("cannot delete provider package service account: {0}")]
    DeleteServiceAccount(StoreError),
    #[error("cannot apply provider package service account: {0}")]
    ApplyServiceAccount(StoreError),
    #[error("cannot apply provider package deployment: {0}")]
    ApplyDeployment(StoreError),
    #[error("provider package deployment is unavailable: {message}")]
    DeploymentUnavailable { message: String },
}

impl HookError {
    /// Stable description of the failure class, without any detail.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::NotProvider(_) => "not a provider package",
            Self::NotProviderRevision(_) => "not a provider revision",
            Self::NotConfiguration(_) => "not a configuration package",
            Self::ControllerConfig(_) => "cannot get referenced controller config",
            Self::DeleteDeployment(_) => "cannot delete provider package deployment",
            Self::DeleteServiceAccount(_) => "cannot delete provider package service account",
            Self::ApplyServiceAccount(_) => "cannot apply provider package service account",
            Self::ApplyDeployment(_) => "cannot apply provider package deployment",
            Self::DeploymentUnavailable { .. } => "provider package deployment is unavailable",
        }
    }

    /// Type mismatches are permanent; everything else may clear on requeue.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NotProvider(_) | Self::NotProviderRevision(_) | Self::NotConfiguration(_)
        )
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::ControllerConfig(error)
            | Self::DeleteDeployment(error)
            | Self::DeleteServiceAccount(error)
            | Self::ApplyServiceAccount(error)
            | Self::ApplyDeployment(error) => Some(error),
            _ => None,
        }
    }
}

/// Per-package-kind lifecycle around establishment.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn pre(&self, meta: &PackageMeta, revision: &mut PackageRevision)
        -> Result<(), HookError>;
    async fn post(
        &self,
        meta: &PackageMeta,
        revision: &mut PackageRevision,
    ) -> Result<(), HookError>;
}

/// Provisions a provider's controller workload while its revision is active
/// and tears it down once the revision goes inactive.
#[derive(Clone)]
pub struct ProviderHooks {
    store: Arc<dyn ObjectStore>,
    builder: Arc<dyn WorkloadBuilder>,
    resolver: Arc<dyn ControllerConfigResolver>,
    namespace: String,
}

impl ProviderHooks {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        let resolver = Arc::new(StoreControllerConfigResolver::new(store.clone()));
        Self {
            store,
            builder: Arc::new(DefaultWorkloadBuilder),
            resolver,
            namespace: namespace.into(),
        }
    }

    pub fn with_builder(mut self, builder: Arc<dyn WorkloadBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ControllerConfigResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    async fn workload(
        &self,
        provider: &ProviderMeta,
        revision: &PackageRevision,
    ) -> Result<Workload, HookError> {
        let config = self
            .resolver
            .resolve(revision)
            .await
            .map_err(HookError::ControllerConfig)?;
        Ok(self
            .builder
            .build(provider, revision, config.as_ref(), &self.namespace))
    }
}

fn require_provider<'a>(
    meta: &'a PackageMeta,
    revision: &PackageRevision,
) -> Result<&'a ProviderMeta, HookError> {
    let provider = meta
        .as_provider()
        .ok_or(HookError::NotProvider(meta.kind()))?;
    if revision.kind != RevisionKind::ProviderRevision {
        return Err(HookError::NotProviderRevision(revision.kind));
    }
    Ok(provider)
}

fn key_of<K: k8s_openapi::Resource>(metadata: &xpkg_types::ObjectMeta) -> ObjectKey {
    ObjectKey::for_resource::<K>(
        metadata.namespace.as_deref(),
        metadata.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl Hooks for ProviderHooks {
    async fn pre(
        &self,
        meta: &PackageMeta,
        revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        let provider = require_provider(meta, revision)?;
        revision.status.permission_requests = provider.permission_requests().to_vec();

        if revision.desired_state() != DesiredState::Inactive {
            debug!(revision = revision.name(), "revision active; skipping workload teardown");
            return Ok(());
        }

        let workload = self.workload(provider, revision).await?;
        let deployment = key_of::<Deployment>(&workload.deployment.metadata);
        if ignore_not_found(self.store.delete(&deployment).await)
            .map_err(HookError::DeleteDeployment)?
            .is_some()
        {
            info!(revision = revision.name(), object = %deployment, "deleted controller deployment");
        }
        let service_account = key_of::<ServiceAccount>(&workload.service_account.metadata);
        if ignore_not_found(self.store.delete(&service_account).await)
            .map_err(HookError::DeleteServiceAccount)?
            .is_some()
        {
            info!(revision = revision.name(), object = %service_account, "deleted controller service account");
        }
        Ok(())
    }

    async fn post(
        &self,
        meta: &PackageMeta,
        revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        let provider = require_provider(meta, revision)?;
        if revision.desired_state() != DesiredState::Active {
            debug!(revision = revision.name(), "revision inactive; skipping workload apply");
            return Ok(());
        }

        let workload = self.workload(provider, revision).await?;
        apply_typed(self.store.as_ref(), &workload.service_account)
            .await
            .map_err(HookError::ApplyServiceAccount)?;
        let applied = apply_typed(self.store.as_ref(), &workload.deployment)
            .await
            .map_err(HookError::ApplyDeployment)?;
        let deployment_name = workload.deployment.metadata.name.clone().unwrap_or_default();
        info!(
            revision = revision.name(),
            namespace = %self.namespace,
            deployment = %deployment_name,
            "applied controller workload"
        );
        revision.set_controller_reference(Reference::new(deployment_name));

        let available = applied
            .status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .and_then(|conditions| {
                conditions
                    .iter()
                    .find(|condition| condition.type_ == DEPLOYMENT_AVAILABLE)
            });
        match available {
            Some(condition) if condition.status.eq_ignore_ascii_case("true") => Ok(()),
            Some(condition) => {
                let message = condition.message.clone().unwrap_or_default();
                warn!(revision = revision.name(), %message, "controller deployment unavailable");
                Err(HookError::DeploymentUnavailable { message })
            }
            None => Ok(()),
        }
    }
}

/// Configuration packages carry no workload; `pre` only checks the variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationHooks;

#[async_trait]
impl Hooks for ConfigurationHooks {
    async fn pre(
        &self,
        meta: &PackageMeta,
        _revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        match meta {
            PackageMeta::Configuration(_) => Ok(()),
            other => Err(HookError::NotConfiguration(other.kind())),
        }
    }

    async fn post(
        &self,
        _meta: &PackageMeta,
        _revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NopHooks;

#[async_trait]
impl Hooks for NopHooks {
    async fn pre(
        &self,
        _meta: &PackageMeta,
        _revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        Ok(())
    }

    async fn post(
        &self,
        _meta: &PackageMeta,
        _revision: &mut PackageRevision,
    ) -> Result<(), HookError> {
        Ok(())
    }
}
