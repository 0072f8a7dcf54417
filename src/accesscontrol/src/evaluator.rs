//! Boolean permission evaluators
//!
//! An [`Evaluator`] is an immutable tree of permission checks combined with
//! `All` / `Any`. Trees are usually built once when a route is registered
//! and then evaluated against many callers' permission sets.
//!
//! ```text
//! Any
//!  ├── plugins:write
//!  ├── plugins:install
//!  └── plugins:read [plugins:class:external]
//! ```
//!
//! Two entry points exist:
//!
//! - [`Evaluator::evaluate`] compares scopes verbatim and never fails.
//! - [`Evaluator::evaluate_resolved`] first expands every scope owned by a
//!   registered resolver, lazily and left to right, so a child skipped by
//!   short-circuiting never triggers a lookup and cannot surface an error.

use std::collections::BTreeSet;
use std::fmt;

use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::ResolutionError;
use crate::scope::{scope_matches, ScopeResolvers};
use crate::types::{OrgId, PermissionSet};

/// Permission check expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
    /// Caller must hold `action`; when `scopes` is non-empty, for at least
    /// one of them. An empty scope string makes the leaf global.
    Permission { action: String, scopes: Vec<String> },
    /// Every child must pass; vacuously true when empty
    All(Vec<Evaluator>),
    /// At least one child must pass; false when empty
    Any(Vec<Evaluator>),
}

impl Evaluator {
    /// Check an action regardless of scope
    pub fn permission(action: impl Into<String>) -> Self {
        Self::Permission {
            action: action.into(),
            scopes: Vec::new(),
        }
    }

    /// Check an action on one scope; `""` is the same as [`Evaluator::permission`]
    pub fn scoped(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::scoped_any(action, [scope.into()])
    }

    /// Check an action on any of several scopes
    pub fn scoped_any<I, S>(action: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Permission {
            action: action.into(),
            scopes: scopes
                .into_iter()
                .map(Into::into)
                .filter(|scope: &String| !scope.is_empty())
                .collect(),
        }
    }

    pub fn all(children: Vec<Evaluator>) -> Self {
        Self::All(children)
    }

    pub fn any(children: Vec<Evaluator>) -> Self {
        Self::Any(children)
    }

    /// Evaluate with scopes taken verbatim
    pub fn evaluate(&self, permissions: &PermissionSet) -> bool {
        match self {
            Self::Permission { action, scopes } => match_leaf(permissions, action, scopes),
            Self::All(children) => children.iter().all(|child| child.evaluate(permissions)),
            Self::Any(children) => children.iter().any(|child| child.evaluate(permissions)),
        }
    }

    /// Evaluate after expanding scopes through the resolver table
    ///
    /// Children are visited left to right. The first resolution error is
    /// returned unless an earlier sibling already decided the outcome.
    pub fn evaluate_resolved<'a>(
        &'a self,
        ctx: &'a RequestContext,
        permissions: &'a PermissionSet,
        org_id: OrgId,
        resolvers: &'a ScopeResolvers,
    ) -> BoxFuture<'a, Result<bool, ResolutionError>> {
        Box::pin(async move {
            match self {
                Self::Permission { action, scopes } => {
                    if is_global(scopes) {
                        return Ok(permissions.contains_action(action));
                    }

                    for scope in scopes {
                        let candidates = resolvers.resolve(ctx, org_id, scope).await?;
                        if match_leaf(permissions, action, &candidates) {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Self::All(children) => {
                    for child in children {
                        if !child.evaluate_resolved(ctx, permissions, org_id, resolvers).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Self::Any(children) => {
                    for child in children {
                        if child.evaluate_resolved(ctx, permissions, org_id, resolvers).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        })
    }

    /// Distinct actions referenced anywhere in the tree
    pub fn actions(&self) -> BTreeSet<&str> {
        let mut actions = BTreeSet::new();
        self.collect_actions(&mut actions);
        actions
    }

    fn collect_actions<'a>(&'a self, actions: &mut BTreeSet<&'a str>) {
        match self {
            Self::Permission { action, .. } => {
                actions.insert(action.as_str());
            }
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_actions(actions);
                }
            }
        }
    }
}

fn is_global(scopes: &[String]) -> bool {
    scopes.is_empty() || scopes.iter().any(String::is_empty)
}

/// Leaf check against already-expanded candidate scopes
fn match_leaf(permissions: &PermissionSet, action: &str, targets: &[String]) -> bool {
    if is_global(targets) {
        return permissions.contains_action(action);
    }

    permissions.scopes_for(action).any(|granted| {
        !granted.is_empty() && targets.iter().any(|target| scope_matches(granted, target))
    })
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Self::Permission { action, scopes } if scopes.is_empty() => return write!(f, "{}", action),
            Self::Permission { action, scopes } => return write!(f, "{}[{}]", action, scopes.join(", ")),
            Self::All(children) => ("all", children),
            Self::Any(children) => ("any", children),
        };

        write!(f, "{}(", name)?;
        for (idx, child) in children.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ResolverFn;
    use crate::types::Permission;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn perms(items: &[(&str, &str)]) -> PermissionSet {
        items.iter().map(|(a, s)| Permission::new(*a, *s)).collect()
    }

    #[test]
    fn test_global_leaf_ignores_granted_scope() {
        let set = perms(&[("plugins:write", "plugins:*")]);
        assert!(Evaluator::permission("plugins:write").evaluate(&set));
        assert!(!Evaluator::permission("plugins:install").evaluate(&set));
    }

    #[test]
    fn test_scoped_leaf() {
        let set = perms(&[("plugins:read", "plugins:class:core")]);

        assert!(Evaluator::scoped("plugins:read", "plugins:class:core").evaluate(&set));
        assert!(!Evaluator::scoped("plugins:read", "plugins:class:external").evaluate(&set));
        assert!(!Evaluator::scoped("plugins:write", "plugins:class:core").evaluate(&set));
    }

    #[test]
    fn test_unscoped_grant_does_not_satisfy_scoped_leaf() {
        let set = perms(&[("plugins:read", "")]);
        assert!(!Evaluator::scoped("plugins:read", "plugins:class:core").evaluate(&set));
    }

    #[test]
    fn test_empty_scope_leaf_is_global() {
        let set = perms(&[("plugins:write", "")]);

        assert_eq!(Evaluator::scoped("plugins:write", ""), Evaluator::permission("plugins:write"));
        assert_eq!(
            Evaluator::scoped_any("plugins:write", ["", "plugins:id:clock"]),
            Evaluator::scoped("plugins:write", "plugins:id:clock")
        );
        assert!(Evaluator::scoped("plugins:write", "").evaluate(&set));
        assert!(!Evaluator::scoped("plugins:install", "").evaluate(&set));

        let literal = Evaluator::Permission {
            action: "plugins:write".to_string(),
            scopes: vec!["plugins:id:clock".to_string(), String::new()],
        };
        assert!(literal.evaluate(&set));
    }

    #[tokio::test]
    async fn test_empty_scope_leaf_skips_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut builder = ScopeResolvers::builder();
        builder
            .register(
                "plugins:",
                Arc::new(ResolverFn::new(move |_org, scope| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ResolutionError::Unavailable(scope.to_string()))
                })),
            )
            .unwrap();
        let resolvers = builder.build();
        let set = perms(&[("plugins:write", "")]);
        let ctx = RequestContext::new();

        let literal = Evaluator::Permission {
            action: "plugins:write".to_string(),
            scopes: vec!["plugins:id:clock".to_string(), String::new()],
        };
        assert!(literal.evaluate_resolved(&ctx, &set, 1, &resolvers).await.unwrap());
        assert!(Evaluator::scoped("plugins:write", "")
            .evaluate_resolved(&ctx, &set, 1, &resolvers)
            .await
            .unwrap());
        assert!(!Evaluator::scoped("plugins:install", "")
            .evaluate_resolved(&ctx, &set, 1, &resolvers)
            .await
            .unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wildcard_grant() {
        let set = perms(&[("plugins:write", "plugins:*")]);
        assert!(Evaluator::scoped("plugins:write", "plugins:id:clock").evaluate(&set));
        assert!(!Evaluator::scoped("plugins:write", "dashboards:uid:1").evaluate(&set));
    }

    #[test]
    fn test_multi_scope_leaf() {
        let set = perms(&[("plugins:read", "plugins:class:external")]);
        let eval = Evaluator::scoped_any("plugins:read", ["plugins:class:core", "plugins:class:external"]);
        assert!(eval.evaluate(&set));
    }

    #[test]
    fn test_empty_combinators() {
        let set = PermissionSet::new();
        assert!(Evaluator::all(vec![]).evaluate(&set));
        assert!(!Evaluator::any(vec![]).evaluate(&set));
    }

    #[test]
    fn test_display() {
        let eval = Evaluator::any(vec![
            Evaluator::permission("plugins:write"),
            Evaluator::scoped("plugins:read", "plugins:class:external"),
            Evaluator::all(vec![]),
        ]);
        assert_eq!(eval.to_string(), "any(plugins:write, plugins:read[plugins:class:external], all())");
    }

    #[test]
    fn test_actions() {
        let eval = Evaluator::all(vec![
            Evaluator::permission("plugins:write"),
            Evaluator::any(vec![
                Evaluator::permission("plugins:install"),
                Evaluator::permission("plugins:write"),
            ]),
        ]);
        assert_eq!(eval.actions().into_iter().collect::<Vec<_>>(), vec!["plugins:install", "plugins:write"]);
    }

    #[tokio::test]
    async fn test_resolved_leaf_matches_class_scope() {
        let mut builder = ScopeResolvers::builder();
        builder
            .register(
                "plugins:id:",
                Arc::new(ResolverFn::new(|_org, _scope| Ok(vec!["plugins:class:core".to_string()]))),
            )
            .unwrap();
        let resolvers = builder.build();

        let set = perms(&[("plugins:read", "plugins:class:core")]);
        let eval = Evaluator::scoped("plugins:read", "plugins:id:clock");

        assert!(!eval.evaluate(&set));
        assert!(eval
            .evaluate_resolved(&RequestContext::new(), &set, 1, &resolvers)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_short_circuit_skips_failing_child() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut builder = ScopeResolvers::builder();
        builder
            .register(
                "plugins:id:",
                Arc::new(ResolverFn::new(move |_org, scope| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ResolutionError::EntityNotFound(scope.to_string()))
                })),
            )
            .unwrap();
        let resolvers = builder.build();
        let ctx = RequestContext::new();

        let set = perms(&[("plugins:write", ""), ("plugins:read", "plugins:*")]);
        let failing = Evaluator::scoped("plugins:read", "plugins:id:gone");

        let any = Evaluator::any(vec![Evaluator::permission("plugins:write"), failing.clone()]);
        assert!(any.evaluate_resolved(&ctx, &set, 1, &resolvers).await.unwrap());

        let all = Evaluator::all(vec![Evaluator::permission("plugins:install"), failing.clone()]);
        assert!(!all.evaluate_resolved(&ctx, &set, 1, &resolvers).await.unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let err = Evaluator::any(vec![failing, Evaluator::permission("plugins:write")])
            .evaluate_resolved(&ctx, &set, 1, &resolvers)
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::EntityNotFound("plugins:id:gone".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
