use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::revision::PKG_API_VERSION;

pub const CONTROLLER_CONFIG_KIND: &str = "ControllerConfig";

fn default_api_version() -> String {
    PKG_API_VERSION.to_string()
}

fn default_kind() -> String {
    CONTROLLER_CONFIG_KIND.to_string()
}

/// Labels and annotations added to the controller pod template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PodObjectMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Overrides applied to a provider's controller workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PodObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// Named, cluster-scoped override object referenced by a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ControllerConfigSpec,
}

impl ControllerConfig {
    pub fn new(name: impl Into<String>, spec: ControllerConfigSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fills_type_fields_when_absent() {
        let config: ControllerConfig = serde_json::from_value(json!({
            "metadata": { "name": "debug" },
            "spec": {
                "replicas": 2,
                "args": ["--debug"],
                "nodeSelector": { "pool": "system" }
            }
        }))
        .expect("decode controller config");

        assert_eq!(config.api_version, PKG_API_VERSION);
        assert_eq!(config.kind, CONTROLLER_CONFIG_KIND);
        assert_eq!(config.name(), "debug");
        assert_eq!(config.spec.replicas, Some(2));
        assert_eq!(config.spec.args, vec!["--debug".to_string()]);
        assert_eq!(config.spec.node_selector.get("pool").map(String::as_str), Some("system"));
    }
}
