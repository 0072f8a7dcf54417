//! Request-facing access control service
//!
//! Fetches the caller's permissions, expands scopes through the resolver
//! table and evaluates an [`Evaluator`] tree.
//!
//! ```text
//! (org, user) → PermissionStore → PermissionSet ─┐
//!                                                ├→ Evaluator → allowed?
//! leaf scope  → ScopeResolvers → candidates ─────┘
//! ```
//!
//! Errors never turn into access: [`AccessControl::is_allowed`] denies on
//! any evaluation error.

pub mod metrics;

pub use metrics::{EvaluationMetrics, MetricsCollector};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::{AccessControlError, Result};
use crate::evaluator::Evaluator;
use crate::scope::ScopeResolvers;
use crate::types::{OrgId, Permission, PermissionSet, SignedInUser, UserId};

/// Source of a caller's effective permissions
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Permissions of `user_id` in `org_id`, already expanded by role membership
    async fn get_permissions(&self, ctx: &RequestContext, org_id: OrgId, user_id: UserId) -> Result<PermissionSet>;
}

/// In-memory permission store
pub struct InMemoryPermissionStore {
    permissions: Arc<RwLock<HashMap<(OrgId, UserId), PermissionSet>>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self {
            permissions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add permissions for a user in an organization
    pub async fn grant(&self, org_id: OrgId, user_id: UserId, permissions: impl IntoIterator<Item = Permission>) {
        let mut store = self.permissions.write().await;
        store.entry((org_id, user_id)).or_default().extend(permissions);
    }

    /// Remove every permission of a user in an organization
    pub async fn revoke_all(&self, org_id: OrgId, user_id: UserId) {
        self.permissions.write().await.remove(&(org_id, user_id));
    }
}

impl Default for InMemoryPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get_permissions(&self, _ctx: &RequestContext, org_id: OrgId, user_id: UserId) -> Result<PermissionSet> {
        let store = self.permissions.read().await;
        Ok(store.get(&(org_id, user_id)).cloned().unwrap_or_default())
    }
}

/// Evaluates permission trees for callers
pub struct AccessControl {
    store: Arc<dyn PermissionStore>,
    resolvers: Arc<ScopeResolvers>,
    metrics: MetricsCollector,
}

impl AccessControl {
    pub fn new(store: Arc<dyn PermissionStore>, resolvers: Arc<ScopeResolvers>) -> Self {
        Self {
            store,
            resolvers,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn resolvers(&self) -> &Arc<ScopeResolvers> {
        &self.resolvers
    }

    /// Decide whether `user_id` in `org_id` passes `evaluator`
    ///
    /// Permission store failures and resolution failures are returned as
    /// errors; callers should treat any error as a denial.
    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        org_id: OrgId,
        user_id: UserId,
        evaluator: &Evaluator,
    ) -> Result<bool> {
        let start = Instant::now();

        let permissions = match self.store.get_permissions(ctx, org_id, user_id).await {
            Ok(permissions) => permissions,
            Err(e) => {
                self.metrics.record_error(None, start.elapsed()).await;
                return Err(e);
            }
        };

        match evaluator
            .evaluate_resolved(ctx, &permissions, org_id, &self.resolvers)
            .await
        {
            Ok(allowed) => {
                debug!(
                    "Evaluated {} for user {} in org {}: {}",
                    evaluator,
                    user_id,
                    org_id,
                    if allowed { "ALLOW" } else { "DENY" }
                );
                self.metrics.record_decision(allowed, start.elapsed()).await;
                Ok(allowed)
            }
            Err(e) => {
                self.metrics.record_error(Some(&e), start.elapsed()).await;
                Err(AccessControlError::from(e))
            }
        }
    }

    /// [`evaluate`](Self::evaluate) for a signed-in caller
    pub async fn evaluate_user(&self, ctx: &RequestContext, user: &SignedInUser, evaluator: &Evaluator) -> Result<bool> {
        self.evaluate(ctx, user.org_id, user.user_id, evaluator).await
    }

    /// Fail-closed decision: any error denies
    pub async fn is_allowed(&self, ctx: &RequestContext, user: &SignedInUser, evaluator: &Evaluator) -> bool {
        match self.evaluate_user(ctx, user, evaluator).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    "Denying {} for user {} in org {}: {}",
                    evaluator, user.user_id, user.org_id, e
                );
                false
            }
        }
    }

    pub async fn get_metrics(&self) -> EvaluationMetrics {
        self.metrics.get_metrics().await
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::scope::ResolverFn;
    use crate::types::OrgRole;

    struct FailingStore;

    #[async_trait]
    impl PermissionStore for FailingStore {
        async fn get_permissions(&self, _ctx: &RequestContext, _org_id: OrgId, _user_id: UserId) -> Result<PermissionSet> {
            Err(AccessControlError::PermissionStore("connection refused".to_string()))
        }
    }

    fn missing_entity_resolvers() -> Arc<ScopeResolvers> {
        let mut builder = ScopeResolvers::builder();
        builder
            .register(
                "plugins:id:",
                Arc::new(ResolverFn::new(|_org, scope| Err(ResolutionError::EntityNotFound(scope.to_string())))),
            )
            .unwrap();
        Arc::new(builder.build())
    }

    #[tokio::test]
    async fn test_permissions_are_per_org() {
        let store = Arc::new(InMemoryPermissionStore::new());
        store.grant(1, 7, vec![Permission::global("plugins:write")]).await;

        let ac = AccessControl::new(store, Arc::new(ScopeResolvers::empty()));
        let ctx = RequestContext::new();
        let eval = Evaluator::permission("plugins:write");

        assert!(ac.evaluate(&ctx, 1, 7, &eval).await.unwrap());
        assert!(!ac.evaluate(&ctx, 2, 7, &eval).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_denies() {
        let ac = AccessControl::new(Arc::new(FailingStore), Arc::new(ScopeResolvers::empty()));
        let user = SignedInUser::new(7, 1, OrgRole::Admin);
        let eval = Evaluator::permission("plugins:write");

        let err = ac.evaluate_user(&RequestContext::new(), &user, &eval).await.unwrap_err();
        assert!(matches!(err, AccessControlError::PermissionStore(_)));
        assert!(!ac.is_allowed(&RequestContext::new(), &user, &eval).await);
        assert_eq!(ac.get_metrics().await.error_count, 2);
    }

    #[tokio::test]
    async fn test_resolution_failure_denies() {
        let store = Arc::new(InMemoryPermissionStore::new());
        store.grant(1, 7, vec![Permission::new("plugins:read", "plugins:*")]).await;

        let ac = AccessControl::new(store, missing_entity_resolvers());
        let user = SignedInUser::new(7, 1, OrgRole::Viewer);
        let eval = Evaluator::scoped("plugins:read", "plugins:id:unknown");

        let err = ac.evaluate_user(&RequestContext::new(), &user, &eval).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!ac.is_allowed(&RequestContext::new(), &user, &eval).await);

        let metrics = ac.get_metrics().await;
        assert_eq!(metrics.not_found_count, 2);
        assert_eq!(metrics.allowed_decisions, 0);
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let store = Arc::new(InMemoryPermissionStore::new());
        store.grant(1, 7, vec![Permission::global("plugins:install")]).await;
        store.revoke_all(1, 7).await;

        let permissions = store.get_permissions(&RequestContext::new(), 1, 7).await.unwrap();
        assert!(permissions.is_empty());
    }
}
