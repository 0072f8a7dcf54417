//! Prefix-keyed scope attribute resolvers
//!
//! A resolver owns one scope prefix (e.g. `plugins:id:`) and rewrites scopes
//! under it into canonical scopes using live entity metadata. Resolvers are
//! registered once at startup through [`ScopeResolversBuilder`]; the built
//! [`ScopeResolvers`] table is immutable and shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{AccessControlError, ResolutionError, Result};
use crate::types::OrgId;

/// Result of a single scope resolution
pub type ResolutionResult = std::result::Result<Vec<String>, ResolutionError>;

/// Rewrites one abstract scope into canonical scopes
#[async_trait]
pub trait ScopeAttributeResolver: Send + Sync {
    /// Resolve `scope` for an organization
    ///
    /// Implementations return the original scope plus the canonical scopes
    /// derived from it, and must reject scopes outside their own prefix with
    /// [`ResolutionError::InvalidScope`].
    async fn resolve(&self, ctx: &RequestContext, org_id: OrgId, scope: &str) -> ResolutionResult;
}

/// Adapter turning a plain function into a resolver
pub struct ResolverFn<F>(F);

impl<F> ResolverFn<F> {
    pub fn new(f: F) -> Self
    where
        F: Fn(OrgId, &str) -> ResolutionResult + Send + Sync,
    {
        Self(f)
    }
}

#[async_trait]
impl<F> ScopeAttributeResolver for ResolverFn<F>
where
    F: Fn(OrgId, &str) -> ResolutionResult + Send + Sync,
{
    async fn resolve(&self, _ctx: &RequestContext, org_id: OrgId, scope: &str) -> ResolutionResult {
        (self.0)(org_id, scope)
    }
}

struct ResolverEntry {
    prefix: String,
    resolver: Arc<dyn ScopeAttributeResolver>,
}

/// Collects resolver registrations during startup
#[derive(Default)]
pub struct ScopeResolversBuilder {
    entries: Vec<ResolverEntry>,
}

impl ScopeResolversBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for a prefix
    ///
    /// Fails with a configuration error when the prefix is empty or already
    /// owned by another resolver.
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        resolver: Arc<dyn ScopeAttributeResolver>,
    ) -> Result<&mut Self> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(AccessControlError::Configuration(
                "scope resolver prefix cannot be empty".to_string(),
            ));
        }

        if self.entries.iter().any(|entry| entry.prefix == prefix) {
            return Err(AccessControlError::Configuration(format!(
                "scope resolver already registered for prefix '{}'",
                prefix
            )));
        }

        debug!("Registered scope resolver for prefix '{}'", prefix);
        self.entries.push(ResolverEntry { prefix, resolver });
        Ok(self)
    }

    /// Freeze the registrations into a lookup table
    pub fn build(mut self) -> ScopeResolvers {
        // Longest prefix first so lookup can stop at the first hit
        self.entries
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then_with(|| a.prefix.cmp(&b.prefix)));

        ScopeResolvers {
            entries: self.entries,
        }
    }
}

/// Immutable resolver table, safe for concurrent reads
#[derive(Default)]
pub struct ScopeResolvers {
    entries: Vec<ResolverEntry>,
}

impl ScopeResolvers {
    /// Table without any resolver; every scope resolves to itself
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ScopeResolversBuilder {
        ScopeResolversBuilder::new()
    }

    /// Resolver owning the longest prefix of `scope`
    pub fn resolver_for(&self, scope: &str) -> Option<(&str, &Arc<dyn ScopeAttributeResolver>)> {
        self.entries
            .iter()
            .find(|entry| scope.starts_with(&entry.prefix))
            .map(|entry| (entry.prefix.as_str(), &entry.resolver))
    }

    /// Registered prefixes, longest first
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.prefix.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand a scope into its candidate scopes
    ///
    /// Scopes no resolver owns are returned verbatim. Otherwise the resolver
    /// runs until it finishes or `ctx` is cancelled, whichever comes first;
    /// cancellation drops the in-flight lookup and yields
    /// [`ResolutionError::Cancelled`]. The original scope is always part of
    /// a successful result.
    pub async fn resolve(&self, ctx: &RequestContext, org_id: OrgId, scope: &str) -> ResolutionResult {
        let Some((prefix, resolver)) = self.resolver_for(scope) else {
            return Ok(vec![scope.to_string()]);
        };

        if ctx.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        let resolved = tokio::select! {
            biased;
            _ = ctx.done() => Err(ResolutionError::Cancelled),
            result = resolver.resolve(ctx, org_id, scope) => result,
        }?;

        let mut scopes = Vec::with_capacity(resolved.len() + 1);
        scopes.push(scope.to_string());
        for candidate in resolved {
            if !scopes.contains(&candidate) {
                scopes.push(candidate);
            }
        }

        debug!("Resolved scope '{}' via '{}' into {:?}", scope, prefix, scopes);
        Ok(scopes)
    }
}

impl fmt::Debug for ScopeResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeResolvers")
            .field("prefixes", &self.prefixes().collect::<Vec<_>>())
            .finish()
    }
}
