use async_trait::async_trait;
use kube::core::DynamicObject;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use xpkg_store::{InMemoryObjectStore, ObjectKey, ObjectStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Get,
    Create,
    Update,
    Delete,
    Apply,
}

/// A scripted failure. `nth` limits it to the nth matching call, counted from 1.
struct Failure {
    op: Op,
    name: String,
    nth: Option<usize>,
}

/// In-memory store that records every call and fails scripted ones.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    inner: InMemoryObjectStore,
    calls: AsyncMutex<Vec<(Op, String)>>,
    failures: Vec<Failure>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, op: Op, name: &str) -> Self {
        self.failures.push(Failure {
            op,
            name: name.to_string(),
            nth: None,
        });
        self
    }

    /// Fails only the `nth` call of `op` on `name`; earlier and later ones pass.
    pub(crate) fn failing_nth(mut self, op: Op, name: &str, nth: usize) -> Self {
        self.failures.push(Failure {
            op,
            name: name.to_string(),
            nth: Some(nth),
        });
        self
    }

    pub(crate) fn memory(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    pub(crate) async fn calls(&self) -> Vec<(Op, String)> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn count(&self, op: Op) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(recorded, _)| *recorded == op)
            .count()
    }

    async fn record(&self, op: Op, name: &str) -> StoreResult<()> {
        let mut calls = self.calls.lock().await;
        calls.push((op, name.to_string()));
        let seen = calls
            .iter()
            .filter(|(recorded, recorded_name)| *recorded == op && recorded_name == name)
            .count();
        drop(calls);
        if self.failures.iter().any(|failure| {
            failure.op == op && failure.name == name && failure.nth.unwrap_or(seen) == seen
        }) {
            return Err(boom());
        }
        Ok(())
    }
}

pub(crate) fn boom() -> StoreError {
    StoreError::Api {
        code: 500,
        message: "boom".to_string(),
    }
}

fn name_of(object: &DynamicObject) -> String {
    object.metadata.name.clone().unwrap_or_default()
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<DynamicObject> {
        self.record(Op::Get, &key.name).await?;
        self.inner.get(key).await
    }

    async fn create(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record(Op::Create, &name_of(object)).await?;
        self.inner.create(object).await
    }

    async fn update(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record(Op::Update, &name_of(object)).await?;
        self.inner.update(object).await
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.record(Op::Delete, &key.name).await?;
        self.inner.delete(key).await
    }

    async fn apply(&self, object: &DynamicObject) -> StoreResult<DynamicObject> {
        self.record(Op::Apply, &name_of(object)).await?;
        self.inner.apply(object).await
    }
}

pub(crate) fn crd(name: &str) -> DynamicObject {
    serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": { "name": name },
        "spec": { "group": "example.org", "scope": "Cluster" }
    }))
    .expect("crd fixture")
}
