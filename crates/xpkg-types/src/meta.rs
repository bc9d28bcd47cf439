//! Package manifest (`meta`) documents.
//!
//! Manifests exist at several schema versions. They are resolved here, once,
//! into a version-agnostic [`PackageMeta`] so that activation logic only ever
//! asks "is this a provider" and never inspects schema versions itself.

use k8s_openapi::api::rbac::v1::PolicyRule;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::revision::PackageKind;

pub const META_API_GROUP: &str = "meta.pkg.xpkg.io";

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("invalid package meta document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("package meta document is missing '{0}'")]
    MissingField(&'static str),
    #[error("unsupported package meta apiVersion '{0}'")]
    UnsupportedVersion(String),
    #[error("unsupported package meta kind '{0}'")]
    UnsupportedKind(String),
}

/// Supported manifest schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaVersion {
    V1Alpha1,
    V1Beta1,
}

impl MetaVersion {
    pub fn api_version(self) -> &'static str {
        match self {
            Self::V1Alpha1 => "meta.pkg.xpkg.io/v1alpha1",
            Self::V1Beta1 => "meta.pkg.xpkg.io/v1beta1",
        }
    }

    fn parse(api_version: &str) -> Result<Self, MetaError> {
        match api_version {
            "meta.pkg.xpkg.io/v1alpha1" => Ok(Self::V1Alpha1),
            "meta.pkg.xpkg.io/v1beta1" => Ok(Self::V1Beta1),
            other => Err(MetaError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// A package this package depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSpec {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub permission_requests: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    #[serde(default)]
    pub controller: ControllerSpec,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMeta {
    pub version: MetaVersion,
    pub metadata: ObjectMeta,
    pub spec: ProviderSpec,
}

impl ProviderMeta {
    pub fn new(name: impl Into<String>, spec: ProviderSpec) -> Self {
        Self {
            version: MetaVersion::V1Beta1,
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            spec,
        }
    }

    pub fn controller_image(&self) -> Option<&str> {
        let image = self.spec.controller.image.trim();
        (!image.is_empty()).then_some(image)
    }

    pub fn permission_requests(&self) -> &[PolicyRule] {
        &self.spec.controller.permission_requests
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationMeta {
    pub version: MetaVersion,
    pub metadata: ObjectMeta,
    pub spec: ConfigurationSpec,
}

impl ConfigurationMeta {
    pub fn new(name: impl Into<String>, spec: ConfigurationSpec) -> Self {
        Self {
            version: MetaVersion::V1Beta1,
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            spec,
        }
    }
}

/// Decoded package manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageMeta {
    Provider(ProviderMeta),
    Configuration(ConfigurationMeta),
}

impl PackageMeta {
    pub fn kind(&self) -> PackageKind {
        match self {
            Self::Provider(_) => PackageKind::Provider,
            Self::Configuration(_) => PackageKind::Configuration,
        }
    }

    pub fn version(&self) -> MetaVersion {
        match self {
            Self::Provider(meta) => meta.version,
            Self::Configuration(meta) => meta.version,
        }
    }

    pub fn name(&self) -> &str {
        let metadata = match self {
            Self::Provider(meta) => &meta.metadata,
            Self::Configuration(meta) => &meta.metadata,
        };
        metadata.name.as_deref().unwrap_or_default()
    }

    pub fn as_provider(&self) -> Option<&ProviderMeta> {
        match self {
            Self::Provider(meta) => Some(meta),
            Self::Configuration(_) => None,
        }
    }

    pub fn as_configuration(&self) -> Option<&ConfigurationMeta> {
        match self {
            Self::Configuration(meta) => Some(meta),
            Self::Provider(_) => None,
        }
    }

    /// Decodes an already parsed manifest document.
    pub fn from_value(document: Value) -> Result<Self, MetaError> {
        let api_version = document
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or(MetaError::MissingField("apiVersion"))?;
        let version = MetaVersion::parse(api_version)?;
        let kind = document
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(MetaError::MissingField("kind"))?
            .to_string();

        match kind.as_str() {
            "Provider" => {
                let raw: RawDocument<ProviderSpec> = serde_json::from_value(document)?;
                Ok(Self::Provider(ProviderMeta {
                    version,
                    metadata: raw.metadata,
                    spec: raw.spec,
                }))
            }
            "Configuration" => {
                let raw: RawDocument<ConfigurationSpec> = serde_json::from_value(document)?;
                Ok(Self::Configuration(ConfigurationMeta {
                    version,
                    metadata: raw.metadata,
                    spec: raw.spec,
                }))
            }
            _ => Err(MetaError::UnsupportedKind(kind)),
        }
    }
}

#[derive(Deserialize)]
struct RawDocument<S> {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: S,
}

/// Decodes a JSON package manifest.
pub fn decode_package_meta(document: &str) -> Result<PackageMeta, MetaError> {
    let value: Value = serde_json::from_str(document)?;
    PackageMeta::from_value(value)
}
