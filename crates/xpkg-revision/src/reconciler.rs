use kube::core::DynamicObject;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use xpkg_types::{Condition, DesiredState, PackageMeta, PackageRevision};

use crate::dispatch::HookRegistry;
use crate::establisher::{EstablishError, Establisher};
use crate::hooks::HookError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("pre-establishment hook failed: {0}")]
    PreHook(HookError),
    #[error("cannot establish control of objects: {0}")]
    Establish(EstablishError),
    #[error("post-establishment hook failed: {0}")]
    PostHook(HookError),
}

impl ReconcileError {
    /// Whether requeueing the revision may succeed without any input change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PreHook(error) | Self::PostHook(error) => error.is_retryable(),
            Self::Establish(error) => error
                .store_error()
                .is_some_and(xpkg_store::StoreError::is_retryable),
        }
    }
}

/// Runs one pass of the revision lifecycle: `pre`, establishment of the
/// package's objects, then `post`. The revision's `Healthy` condition records
/// the outcome.
#[derive(Clone)]
pub struct RevisionReconciler {
    hooks: HookRegistry,
    establisher: Arc<dyn Establisher>,
}

impl RevisionReconciler {
    pub fn new(hooks: HookRegistry, establisher: Arc<dyn Establisher>) -> Self {
        Self { hooks, establisher }
    }

    pub async fn reconcile(
        &self,
        meta: &PackageMeta,
        revision: &mut PackageRevision,
        objects: &[DynamicObject],
    ) -> Result<(), ReconcileError> {
        let result = self.run(meta, revision, objects).await;
        match &result {
            Ok(()) => {
                info!(revision = revision.name(), "revision healthy");
                revision.set_condition(Condition::healthy());
            }
            Err(error) => {
                debug!(revision = revision.name(), %error, "revision unhealthy");
                revision.set_condition(Condition::unhealthy(error.to_string()));
            }
        }
        result
    }

    async fn run(
        &self,
        meta: &PackageMeta,
        revision: &mut PackageRevision,
        objects: &[DynamicObject],
    ) -> Result<(), ReconcileError> {
        let hooks = self.hooks.hooks_for(revision.package_kind());
        hooks
            .pre(meta, revision)
            .await
            .map_err(ReconcileError::PreHook)?;

        let control = revision.desired_state() == DesiredState::Active;
        let references = self
            .establisher
            .establish(objects, &revision.parent_identity(), control)
            .await
            .map_err(ReconcileError::Establish)?;
        debug!(
            revision = revision.name(),
            objects = references.len(),
            control,
            "established package objects"
        );
        revision.status.object_refs = references;

        hooks
            .post(meta, revision)
            .await
            .map_err(ReconcileError::PostHook)
    }
}
