//! Shared data types for package revisions and the objects they own.

mod controller_config;
mod meta;
mod reference;
mod revision;

pub use controller_config::{
    ControllerConfig, ControllerConfigSpec, PodObjectMeta, CONTROLLER_CONFIG_KIND,
};
pub use meta::{
    decode_package_meta, ConfigurationMeta, ConfigurationSpec, ControllerSpec, Dependency,
    MetaError, MetaVersion, PackageMeta, ProviderMeta, ProviderSpec, META_API_GROUP,
};
pub use reference::{
    api_group, establish_owner_reference, OwnershipChange, ParentIdentity, Reference,
    TypedReference,
};
pub use revision::{
    Condition, ConditionStatus, DesiredState, PackageKind, PackageRevision, PackageRevisionSpec,
    PackageRevisionStatus, RevisionKind, CONDITION_TYPE_HEALTHY, PKG_API_GROUP, PKG_API_VERSION,
    REASON_HEALTHY, REASON_UNHEALTHY,
};

pub use k8s_openapi::api::rbac::v1::PolicyRule;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
