use std::collections::HashMap;
use std::sync::Arc;
use xpkg_types::PackageKind;

use crate::hooks::{ConfigurationHooks, Hooks, NopHooks, ProviderHooks};

/// Hook strategy per package kind. Kinds without an entry get no-op hooks.
#[derive(Clone)]
pub struct HookRegistry {
    hooks: HashMap<PackageKind, Arc<dyn Hooks>>,
    fallback: Arc<dyn Hooks>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
            fallback: Arc::new(NopHooks),
        }
    }

    /// Provider and configuration hooks as a package manager wires them.
    pub fn standard(provider: ProviderHooks) -> Self {
        Self::new()
            .register(PackageKind::Provider, Arc::new(provider))
            .register(PackageKind::Configuration, Arc::new(ConfigurationHooks))
    }

    pub fn register(mut self, kind: PackageKind, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks.insert(kind, hooks);
        self
    }

    pub fn hooks_for(&self, kind: PackageKind) -> Arc<dyn Hooks> {
        self.hooks
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
