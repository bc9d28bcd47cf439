//! Controller workload derived from a provider revision.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSecurityContext, PodSpec,
    PodTemplateSpec, SecurityContext, ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use xpkg_types::{ControllerConfig, PackageRevision, ProviderMeta};

pub const REVISION_LABEL: &str = "pkg.xpkg.io/revision";
pub const CONTROLLER_CONTAINER_NAME: &str = "provider";

const CONTROLLER_USER_ID: i64 = 2000;
const CONTROLLER_GROUP_ID: i64 = 2000;

/// Service account and deployment that run a provider's controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub service_account: ServiceAccount,
    pub deployment: Deployment,
}

/// Derives the controller workload for a provider revision. Implementations
/// must be pure: the same inputs always produce the same objects.
pub trait WorkloadBuilder: Send + Sync {
    fn build(
        &self,
        provider: &ProviderMeta,
        revision: &PackageRevision,
        config: Option<&ControllerConfig>,
        namespace: &str,
    ) -> Workload;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkloadBuilder;

impl WorkloadBuilder for DefaultWorkloadBuilder {
    fn build(
        &self,
        provider: &ProviderMeta,
        revision: &PackageRevision,
        config: Option<&ControllerConfig>,
        namespace: &str,
    ) -> Workload {
        let name = revision.name().to_string();
        let owner = revision.parent_identity().owner_reference(true);
        let selector_labels = BTreeMap::from([(REVISION_LABEL.to_string(), name.clone())]);

        let object_meta = ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        };

        let image = provider
            .controller_image()
            .unwrap_or(revision.spec.image.as_str())
            .to_string();
        let mut container = Container {
            name: CONTROLLER_CONTAINER_NAME.to_string(),
            image: Some(image),
            env: Some(vec![EnvVar {
                name: "POD_NAMESPACE".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.namespace".to_string(),
                        ..ObjectFieldSelector::default()
                    }),
                    ..EnvVarSource::default()
                }),
                ..EnvVar::default()
            }]),
            security_context: Some(SecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(CONTROLLER_USER_ID),
                run_as_group: Some(CONTROLLER_GROUP_ID),
                allow_privilege_escalation: Some(false),
                privileged: Some(false),
                read_only_root_filesystem: Some(true),
                ..SecurityContext::default()
            }),
            ..Container::default()
        };
        let mut pod_spec = PodSpec {
            service_account_name: Some(name.clone()),
            security_context: Some(PodSecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(CONTROLLER_USER_ID),
                run_as_group: Some(CONTROLLER_GROUP_ID),
                ..PodSecurityContext::default()
            }),
            ..PodSpec::default()
        };
        let mut template_labels = BTreeMap::new();
        let mut template_annotations = BTreeMap::new();
        let mut replicas = 1;

        if let Some(config) = config {
            let spec = &config.spec;
            if let Some(pod_meta) = &spec.metadata {
                template_labels.extend(pod_meta.labels.clone());
                template_annotations.extend(pod_meta.annotations.clone());
            }
            if let Some(count) = spec.replicas {
                replicas = count;
            }
            if let Some(image) = &spec.image {
                container.image = Some(image.clone());
            }
            if let Some(policy) = &spec.image_pull_policy {
                container.image_pull_policy = Some(policy.clone());
            }
            if !spec.args.is_empty() {
                container.args = Some(spec.args.clone());
            }
            if !spec.env.is_empty() {
                container
                    .env
                    .get_or_insert_with(Vec::new)
                    .extend(spec.env.iter().cloned());
            }
            if spec.resources.is_some() {
                container.resources = spec.resources.clone();
            }
            if !spec.node_selector.is_empty() {
                pod_spec.node_selector = Some(spec.node_selector.clone());
            }
            if !spec.tolerations.is_empty() {
                pod_spec.tolerations = Some(spec.tolerations.clone());
            }
            if let Some(account) = &spec.service_account_name {
                pod_spec.service_account_name = Some(account.clone());
            }
        }

        // The selector label must survive any override.
        template_labels.extend(selector_labels.clone());
        pod_spec.containers = vec![container];

        let service_account = ServiceAccount {
            metadata: object_meta.clone(),
            ..ServiceAccount::default()
        };
        let deployment = Deployment {
            metadata: object_meta,
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(selector_labels),
                    ..LabelSelector::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        name: Some(name),
                        labels: Some(template_labels),
                        annotations: (!template_annotations.is_empty())
                            .then_some(template_annotations),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(pod_spec),
                },
                ..DeploymentSpec::default()
            }),
            status: None,
        };

        Workload {
            service_account,
            deployment,
        }
    }
}
