use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::core::DynamicObject;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use xpkg_revision::{
    ApiEstablisher, HookRegistry, ProviderHooks, ReconcileError, RevisionReconciler,
};
use xpkg_store::{
    from_dynamic, to_dynamic, InMemoryObjectStore, ObjectKey, ObjectStore, StoreError,
    StoreResult,
};
use xpkg_types::{
    ConditionStatus, ControllerSpec, DesiredState, ObjectMeta, PackageMeta, PackageRevision,
    ProviderMeta, ProviderSpec, Reference, CONDITION_TYPE_HEALTHY,
};

const NAMESPACE: &str = "xpkg-system";

/// Store that rejects the first `update` with a conflict, as a concurrent
/// writer would cause.
struct ConflictOnceStore {
    inner: InMemoryObjectStore,
    conflicts_left: AsyncMutex<usize>,
    writes: AsyncMutex<Vec<String>>,
}

impl ConflictOnceStore {
    fn new(inner: InMemoryObjectStore, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts_left: AsyncMutex::new(conflicts),
            writes: AsyncMutex::new(Vec::new()),
        }
    }

    async fn record(&self, verb: &str, object: &DynamicObject) {
        let name = object.metadata.name.clone().unwrap_or_default();
        self.writes.lock().await.push(format!("{verb} {name}"));
    }
}

#[async_trait]
impl ObjectStore for ConflictOnceStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<DynamicObject> {
        self.inner.get(key).await
    }

    async fn create(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record("create", object).await;
        self.inner.create(object).await
    }

    async fn update(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record("update", object).await;
        let mut conflicts_left = self.conflicts_left.lock().await;
        if *conflicts_left > 0 {
            *conflicts_left -= 1;
            return Err(StoreError::Conflict {
                key: ObjectKey::of(object)?,
                message: "the object has been modified".to_string(),
            });
        }
        drop(conflicts_left);
        self.inner.update(object).await
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn apply(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record("apply", object).await;
        self.inner.apply(object).await
    }
}

fn provider_meta() -> PackageMeta {
    PackageMeta::Provider(ProviderMeta::new(
        "provider-aws",
        ProviderSpec {
            controller: ControllerSpec {
                image: "registry.example/provider-aws-controller:v0.2.0".to_string(),
                permission_requests: Vec::new(),
            },
            depends_on: Vec::new(),
        },
    ))
}

fn revision(name: &str, uid: &str, desired: DesiredState) -> PackageRevision {
    let mut revision = PackageRevision::provider(name, desired);
    revision.metadata.uid = Some(uid.to_string());
    revision
}

fn crd(name: &str) -> DynamicObject {
    serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": { "name": name },
        "spec": { "group": "s3.example.org", "scope": "Cluster" }
    }))
    .expect("crd fixture")
}

fn crd_key(name: &str) -> ObjectKey {
    ObjectKey::new("apiextensions.k8s.io/v1", "CustomResourceDefinition", None, name)
}

fn deployment_key(name: &str) -> ObjectKey {
    ObjectKey::for_resource::<Deployment>(Some(NAMESPACE), name)
}

fn reconciler(store: Arc<dyn ObjectStore>) -> RevisionReconciler {
    RevisionReconciler::new(
        HookRegistry::standard(ProviderHooks::new(store.clone(), NAMESPACE)),
        Arc::new(ApiEstablisher::new(store)),
    )
}

/// (uid, controller) pairs of an object's owner references.
async fn owners_of(store: &InMemoryObjectStore, key: &ObjectKey) -> Vec<(String, bool)> {
    let object = store.get(key).await.expect("stored object");
    object
        .metadata
        .owner_references
        .unwrap_or_default()
        .into_iter()
        .map(|owner| (owner.uid, owner.controller.unwrap_or(false)))
        .collect()
}

#[tokio::test]
async fn integration_install_then_upgrade_hands_over_control() {
    let store = Arc::new(InMemoryObjectStore::new());
    let reconciler = reconciler(store.clone());
    let objects = [crd("buckets.s3.example.org"), crd("queues.s3.example.org")];

    let mut first = revision("provider-aws-1", "uid-1", DesiredState::Active);
    reconciler
        .reconcile(&provider_meta(), &mut first, &objects)
        .await
        .expect("install");
    assert_eq!(
        owners_of(&store, &crd_key("buckets.s3.example.org")).await,
        vec![("uid-1".to_string(), true)]
    );
    assert!(store.contains(&deployment_key("provider-aws-1")).await);
    assert!(
        store
            .contains(&ObjectKey::for_resource::<ServiceAccount>(
                Some(NAMESPACE),
                "provider-aws-1"
            ))
            .await
    );

    // The outgoing revision releases control before the new one claims it.
    first.spec.desired_state = DesiredState::Inactive;
    reconciler
        .reconcile(&provider_meta(), &mut first, &objects)
        .await
        .expect("deactivate first");
    assert!(!store.contains(&deployment_key("provider-aws-1")).await);

    let mut second = revision("provider-aws-2", "uid-2", DesiredState::Active);
    reconciler
        .reconcile(&provider_meta(), &mut second, &objects)
        .await
        .expect("activate second");

    for name in ["buckets.s3.example.org", "queues.s3.example.org"] {
        assert_eq!(
            owners_of(&store, &crd_key(name)).await,
            vec![("uid-1".to_string(), false), ("uid-2".to_string(), true)]
        );
    }
    assert_eq!(
        second.controller_reference(),
        Some(&Reference::new("provider-aws-2"))
    );
    let deployment: Deployment = from_dynamic(
        &store
            .get(&deployment_key("provider-aws-2"))
            .await
            .expect("deployment"),
    )
    .expect("typed deployment");
    let owners = deployment.metadata.owner_references.expect("owners");
    assert_eq!(owners[0].uid, "uid-2");
    assert_eq!(owners[0].controller, Some(true));
}

#[tokio::test]
async fn integration_unavailable_deployment_marks_revision_unhealthy() {
    let seeded = Deployment {
        metadata: ObjectMeta {
            name: Some("provider-aws-1".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(DeploymentStatus {
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: "False".to_string(),
                message: Some("Deployment does not have minimum availability.".to_string()),
                ..DeploymentCondition::default()
            }]),
            ..DeploymentStatus::default()
        }),
        ..Deployment::default()
    };
    let store = Arc::new(
        InMemoryObjectStore::seeded([to_dynamic(&seeded).expect("dynamic deployment")])
            .await
            .expect("seed"),
    );
    let mut revision = revision("provider-aws-1", "uid-1", DesiredState::Active);

    let error = reconciler(store.clone())
        .reconcile(&provider_meta(), &mut revision, &[crd("buckets.s3.example.org")])
        .await
        .expect_err("deployment unavailable");
    assert!(matches!(error, ReconcileError::PostHook(_)));
    assert!(error.is_retryable());

    let condition = revision
        .condition(CONDITION_TYPE_HEALTHY)
        .expect("healthy condition");
    assert_eq!(condition.status, ConditionStatus::False);
    assert!(condition
        .message
        .as_deref()
        .is_some_and(|message| message.contains("minimum availability")));
    assert_eq!(
        revision.controller_reference(),
        Some(&Reference::new("provider-aws-1"))
    );
    assert_eq!(revision.status.object_refs.len(), 1);
}

#[tokio::test]
async fn integration_conflict_is_retryable_and_requeue_converges() {
    let inner = InMemoryObjectStore::seeded([crd("buckets.s3.example.org")])
        .await
        .expect("seed");
    let store = Arc::new(ConflictOnceStore::new(inner, 1));
    let reconciler = reconciler(store.clone());
    let mut revision = revision("provider-aws-1", "uid-1", DesiredState::Active);
    let objects = [crd("buckets.s3.example.org")];

    let error = reconciler
        .reconcile(&provider_meta(), &mut revision, &objects)
        .await
        .expect_err("first pass conflicts");
    assert!(matches!(error, ReconcileError::Establish(_)));
    assert!(error.is_retryable());

    reconciler
        .reconcile(&provider_meta(), &mut revision, &objects)
        .await
        .expect("requeue succeeds");
    assert_eq!(
        owners_of(&store.inner, &crd_key("buckets.s3.example.org")).await,
        vec![("uid-1".to_string(), true)]
    );
    assert_eq!(
        revision
            .condition(CONDITION_TYPE_HEALTHY)
            .map(|condition| condition.status),
        Some(ConditionStatus::True)
    );

    let writes = store.writes.lock().await.clone();
    assert_eq!(
        writes,
        vec![
            "update buckets.s3.example.org",
            "update buckets.s3.example.org",
            "apply provider-aws-1",
            "apply provider-aws-1",
        ]
    );
}
