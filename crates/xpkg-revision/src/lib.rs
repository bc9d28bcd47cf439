//! Ownership establishment and activation hooks for package revisions.

mod config_resolver;
mod dispatch;
mod establisher;
mod hooks;
mod reconciler;
#[cfg(test)]
mod test_support;
mod workload;

pub use config_resolver::{ControllerConfigResolver, StoreControllerConfigResolver};
pub use dispatch::HookRegistry;
pub use establisher::{ApiEstablisher, EstablishError, Establisher};
pub use hooks::{ConfigurationHooks, HookError, Hooks, NopHooks, ProviderHooks};
pub use reconciler::{ReconcileError, RevisionReconciler};
pub use workload::{
    DefaultWorkloadBuilder, Workload, WorkloadBuilder, CONTROLLER_CONTAINER_NAME, REVISION_LABEL,
};
