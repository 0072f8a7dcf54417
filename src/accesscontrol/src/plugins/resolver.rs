//! Plugin lookup and identifier scope resolution
//!
//! Grants target plugin classes (`plugins:class:core`,
//! `plugins:class:external`) rather than individual plugins. The resolver
//! here rewrites `plugins:id:<id>` into the class scope of that plugin so
//! class grants apply to identifier checks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CORE_SCOPE, EXTERNAL_SCOPE, SCOPE_PROVIDER};
use crate::config::CatalogEntry;
use crate::context::RequestContext;
use crate::error::ResolutionError;
use crate::scope::{ParsedScope, ResolutionResult, ScopeAttributeResolver, ScopeKind};
use crate::types::OrgId;

/// Plugin metadata needed for access decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,

    /// Built into the server rather than installed
    #[serde(default)]
    pub is_core: bool,
}

impl PluginInfo {
    pub fn core(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_core: true,
        }
    }

    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_core: false,
        }
    }

    /// Class scope this plugin falls under
    pub fn class_scope(&self) -> &'static str {
        if self.is_core {
            CORE_SCOPE
        } else {
            EXTERNAL_SCOPE
        }
    }
}

/// Plugin lookup
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// `Ok(None)` when no such plugin is installed; `Err(Unavailable)` when
    /// the backing store cannot answer
    async fn plugin(&self, ctx: &RequestContext, plugin_id: &str) -> Result<Option<PluginInfo>, ResolutionError>;
}

/// In-memory plugin store
pub struct InMemoryPluginStore {
    plugins: Arc<RwLock<HashMap<String, PluginInfo>>>,
}

impl InMemoryPluginStore {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed from the configured catalog
    pub fn from_catalog(catalog: &[CatalogEntry]) -> Self {
        let plugins = catalog
            .iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    PluginInfo {
                        id: entry.id.clone(),
                        is_core: entry.core,
                    },
                )
            })
            .collect();

        Self {
            plugins: Arc::new(RwLock::new(plugins)),
        }
    }

    pub async fn install(&self, plugin: PluginInfo) {
        self.plugins.write().await.insert(plugin.id.clone(), plugin);
    }

    pub async fn uninstall(&self, plugin_id: &str) -> Option<PluginInfo> {
        self.plugins.write().await.remove(plugin_id)
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }
}

impl Default for InMemoryPluginStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginStore for InMemoryPluginStore {
    async fn plugin(&self, _ctx: &RequestContext, plugin_id: &str) -> Result<Option<PluginInfo>, ResolutionError> {
        Ok(self.plugins.read().await.get(plugin_id).cloned())
    }
}

/// Resolves `plugins:id:<id>` into `[scope, <class scope>]`
pub struct IdScopeResolver {
    prefix: String,
    store: Arc<dyn PluginStore>,
}

impl IdScopeResolver {
    pub fn new(store: Arc<dyn PluginStore>) -> Self {
        Self {
            prefix: SCOPE_PROVIDER.id_prefix(),
            store,
        }
    }

    /// Prefix this resolver owns
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl ScopeAttributeResolver for IdScopeResolver {
    async fn resolve(&self, ctx: &RequestContext, _org_id: OrgId, scope: &str) -> ResolutionResult {
        let parsed = ParsedScope::parse(scope)?;
        if parsed.namespace() != SCOPE_PROVIDER.namespace() || parsed.kind() != &ScopeKind::Id {
            return Err(ResolutionError::InvalidScope(format!(
                "'{}' is not under '{}'",
                scope, self.prefix
            )));
        }

        // `plugins:id:*` names every plugin, so there is no class to add
        if parsed.is_wildcard() {
            return Ok(vec![scope.to_string()]);
        }

        let plugin_id = parsed.value();
        let Some(plugin) = self.store.plugin(ctx, plugin_id).await? else {
            debug!("Plugin '{}' is not installed", plugin_id);
            return Err(ResolutionError::EntityNotFound(plugin_id.to_string()));
        };

        Ok(vec![scope.to_string(), plugin.class_scope().to_string()])
    }
}

/// Prefix and resolver pair ready for registration
pub fn new_id_scope_resolver(store: Arc<dyn PluginStore>) -> (String, Arc<dyn ScopeAttributeResolver>) {
    let resolver = IdScopeResolver::new(store);
    (resolver.prefix().to_string(), Arc::new(resolver))
}
