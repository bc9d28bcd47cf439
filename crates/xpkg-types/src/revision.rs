use chrono::{DateTime, Utc};
use k8s_openapi::api::rbac::v1::PolicyRule;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::reference::{ParentIdentity, Reference, TypedReference};

pub const PKG_API_GROUP: &str = "pkg.xpkg.io";
pub const PKG_API_VERSION: &str = "pkg.xpkg.io/v1alpha1";

pub const CONDITION_TYPE_HEALTHY: &str = "Healthy";
pub const REASON_HEALTHY: &str = "HealthyPackageRevision";
pub const REASON_UNHEALTHY: &str = "UnhealthyPackageRevision";

/// Whether a revision's workload should exist and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DesiredState {
    #[default]
    Inactive,
    Active,
}

/// Logical package kinds with distinct activation workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageKind {
    Provider,
    Configuration,
}

impl PackageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Configuration => "Configuration",
        }
    }
}

/// Object kinds a package revision may be stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevisionKind {
    ProviderRevision,
    ConfigurationRevision,
}

impl RevisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderRevision => "ProviderRevision",
            Self::ConfigurationRevision => "ConfigurationRevision",
        }
    }

    pub fn package_kind(self) -> PackageKind {
        match self {
            Self::ProviderRevision => PackageKind::Provider,
            Self::ConfigurationRevision => PackageKind::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Observed condition recorded on a revision's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// The revision's objects and workload were established.
    pub fn healthy() -> Self {
        Self {
            type_: CONDITION_TYPE_HEALTHY.to_string(),
            status: ConditionStatus::True,
            reason: REASON_HEALTHY.to_string(),
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    /// The revision could not be established; `message` names the failure.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            type_: CONDITION_TYPE_HEALTHY.to_string(),
            status: ConditionStatus::False,
            reason: REASON_UNHEALTHY.to_string(),
            message: Some(message.into()),
            last_transition_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageRevisionSpec {
    #[serde(default)]
    pub desired_state: DesiredState,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub revision: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_config_ref: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageRevisionStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_requests: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_refs: Vec<TypedReference>,
}

/// One installed, versioned instance of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRevision {
    pub api_version: String,
    pub kind: RevisionKind,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PackageRevisionSpec,
    #[serde(default)]
    pub status: PackageRevisionStatus,
}

impl PackageRevision {
    pub fn new(kind: RevisionKind, name: impl Into<String>, desired_state: DesiredState) -> Self {
        Self {
            api_version: PKG_API_VERSION.to_string(),
            kind,
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            spec: PackageRevisionSpec {
                desired_state,
                ..PackageRevisionSpec::default()
            },
            status: PackageRevisionStatus::default(),
        }
    }

    pub fn provider(name: impl Into<String>, desired_state: DesiredState) -> Self {
        Self::new(RevisionKind::ProviderRevision, name, desired_state)
    }

    pub fn configuration(name: impl Into<String>, desired_state: DesiredState) -> Self {
        Self::new(RevisionKind::ConfigurationRevision, name, desired_state)
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn package_kind(&self) -> PackageKind {
        self.kind.package_kind()
    }

    pub fn desired_state(&self) -> DesiredState {
        self.spec.desired_state
    }

    pub fn controller_config_ref(&self) -> Option<&Reference> {
        self.spec.controller_config_ref.as_ref()
    }

    pub fn controller_reference(&self) -> Option<&Reference> {
        self.status.controller_ref.as_ref()
    }

    pub fn set_controller_reference(&mut self, reference: Reference) {
        self.status.controller_ref = Some(reference);
    }

    pub fn parent_identity(&self) -> ParentIdentity {
        ParentIdentity::new(
            self.api_version.clone(),
            self.kind.as_str(),
            self.name(),
            self.metadata.uid.clone().unwrap_or_default(),
        )
    }

    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|condition| condition.type_ == type_)
    }

    /// Records `condition`, replacing any condition of the same type. The
    /// transition time is kept when the status did not change.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .status
            .conditions
            .iter_mut()
            .find(|existing| existing.type_ == condition.type_)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.status.conditions.push(condition),
        }
    }
}
