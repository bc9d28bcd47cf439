use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::{Deserialize, Serialize};

/// Name-only pointer to a cluster-scoped object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Pointer to an object brought under a revision's ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TypedReference {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }
}

/// Identity of an object that owns or controls other objects.
///
/// `uid` must be the parent's live uid. The API server rejects owner
/// references with an empty uid, and one pointing at a deleted uid lets the
/// garbage collector remove the child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

impl ParentIdentity {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// Returns true when `reference` points at this parent.
    ///
    /// Only the API group of `apiVersion` takes part in the match, so a parent
    /// served at a newer version, or recreated under a new uid, keeps the slot
    /// it already holds.
    pub fn matches(&self, reference: &OwnerReference) -> bool {
        api_group(&reference.api_version) == api_group(&self.api_version)
            && reference.kind == self.kind
            && reference.name == self.name
    }

    /// Builds the owner reference this parent places on a child.
    pub fn owner_reference(&self, control: bool) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(control),
            block_owner_deletion: Some(true),
        }
    }
}

/// Returns the group part of an `apiVersion`, empty for the core group.
pub fn api_group(api_version: &str) -> &str {
    match api_version.rfind('/') {
        Some(index) => &api_version[..index],
        None => "",
    }
}

/// Outcome of reconciling one parent's slot in an owner reference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipChange {
    Unchanged,
    ControllerFlagChanged,
    /// The slot pointed at a stale `uid` or `apiVersion` of the parent.
    IdentityRefreshed,
    Added,
}

impl OwnershipChange {
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Finds the owner reference belonging to `parent` and brings its identity and
/// controller flag up to date, appending a new reference only when none exists.
pub fn establish_owner_reference(
    references: &mut Vec<OwnerReference>,
    parent: &ParentIdentity,
    control: bool,
) -> OwnershipChange {
    if let Some(existing) = references
        .iter_mut()
        .find(|reference| parent.matches(reference))
    {
        let stale_identity =
            existing.uid != parent.uid || existing.api_version != parent.api_version;
        let flag_changed = existing.controller.unwrap_or(false) != control;
        if stale_identity {
            existing.uid = parent.uid.clone();
            existing.api_version = parent.api_version.clone();
            existing.controller = Some(control);
            return OwnershipChange::IdentityRefreshed;
        }
        if !flag_changed {
            return OwnershipChange::Unchanged;
        }
        existing.controller = Some(control);
        return OwnershipChange::ControllerFlagChanged;
    }

    references.push(parent.owner_reference(control));
    OwnershipChange::Added
}
