//! Plugin access control
//!
//! Actions, scopes and fixed roles for plugins, the evaluator guarding the
//! plugin admin page and the resolver that maps plugin identifiers onto
//! their class (`core` or `external`).
//!
//! # Example
//!
//! ```rust
//! use plugin_access::config::PluginSettings;
//! use plugin_access::plugins::admin_access_evaluator;
//! use plugin_access::types::{Permission, PermissionSet};
//!
//! let caller: PermissionSet = vec![Permission::global("plugins:write")].into_iter().collect();
//! assert!(admin_access_evaluator(&PluginSettings::new(false)).evaluate(&caller));
//! ```

mod resolver;
mod roles;

pub use resolver::{new_id_scope_resolver, IdScopeResolver, InMemoryPluginStore, PluginInfo, PluginStore};
pub use roles::{
    declare_rbac_roles, fixed_role_name, plugin_role_registrations, APP_READER_ROLE, EXTERNAL_READER_ROLE,
    MAINTAINER_ROLE, READER_ROLE, WRITER_ROLE,
};

use std::sync::Arc;

use crate::config::PluginSettings;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::roles::FixedRoleRegistry;
use crate::scope::{ScopeProvider, ScopeResolversBuilder};
use crate::types::{OrgRole, SignedInUser};

pub const ACTION_INSTALL: &str = "plugins:install";
pub const ACTION_WRITE: &str = "plugins:write";
pub const ACTION_READ: &str = "plugins:read";

/// Access to app plugins
pub const ACTION_APP_ACCESS: &str = "plugins.app:access";

pub const CLASS_BASED_SCOPE_PREFIX: &str = "plugins:class:";
pub const EXTERNAL_SCOPE: &str = "plugins:class:external";
pub const CORE_SCOPE: &str = "plugins:class:core";

pub const SCOPE_PROVIDER: ScopeProvider = ScopeProvider::new("plugins");

/// Evaluator protecting the plugin admin page
///
/// With installation enabled, writers, installers and readers of external
/// plugins get in. Without it only writers do, since nothing can be
/// installed.
pub fn admin_access_evaluator(settings: &PluginSettings) -> Evaluator {
    if settings.admin_enabled {
        return Evaluator::any(vec![
            Evaluator::permission(ACTION_WRITE),
            Evaluator::permission(ACTION_INSTALL),
            Evaluator::scoped(ACTION_READ, EXTERNAL_SCOPE),
        ]);
    }

    Evaluator::permission(ACTION_WRITE)
}

/// Evaluator for reading one plugin's settings
pub fn read_plugin_evaluator(plugin_id: &str) -> Evaluator {
    Evaluator::scoped(ACTION_READ, SCOPE_PROVIDER.resource_scope(plugin_id))
}

/// Evaluator for opening an app plugin
pub fn app_access_evaluator(plugin_id: &str) -> Evaluator {
    Evaluator::scoped(ACTION_APP_ACCESS, SCOPE_PROVIDER.resource_scope(plugin_id))
}

/// Legacy admin-page predicate for call sites without an evaluator
///
/// Derived from [`admin_access_evaluator`] applied to the permissions the
/// caller receives through builtin role grants, so it decides like
/// "org Admin, or server admin while installation is enabled". The registry
/// must hold the roles declared by [`declare_rbac_roles`] for the same
/// settings.
pub fn req_can_admin_plugins(
    settings: &PluginSettings,
    registry: Arc<FixedRoleRegistry>,
) -> impl Fn(&SignedInUser) -> bool + Send + Sync {
    let evaluator = admin_access_evaluator(settings);
    move |user: &SignedInUser| evaluator.evaluate(&registry.permissions_for(user))
}

/// Legacy predicate guarding the listing of one plugin
///
/// Core plugins are visible to any signed-in caller, others to org admins.
pub fn req_can_read_plugin(plugin: &PluginInfo) -> impl Fn(&SignedInUser) -> bool + Send + Sync {
    let is_core = plugin.is_core;
    move |user: &SignedInUser| {
        if is_core {
            user.is_signed_in()
        } else {
            user.org_role == OrgRole::Admin
        }
    }
}

/// Register the plugin identifier resolver
pub fn register_resolvers(builder: &mut ScopeResolversBuilder, store: Arc<dyn PluginStore>) -> Result<()> {
    let (prefix, resolver) = new_id_scope_resolver(store);
    builder.register(prefix, resolver)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Permission, PermissionSet};

    fn perms(items: &[(&str, &str)]) -> PermissionSet {
        items.iter().map(|(a, s)| Permission::new(*a, *s)).collect()
    }

    #[test]
    fn test_admin_evaluator_shape() {
        assert_eq!(
            admin_access_evaluator(&PluginSettings::new(false)),
            Evaluator::permission(ACTION_WRITE)
        );
        assert_eq!(
            admin_access_evaluator(&PluginSettings::new(true)).to_string(),
            "any(plugins:write, plugins:install, plugins:read[plugins:class:external])"
        );
    }

    #[test]
    fn test_admin_evaluator_tracks_flag() {
        let installer = perms(&[(ACTION_INSTALL, "")]);
        let mut settings = PluginSettings::new(true);
        assert!(admin_access_evaluator(&settings).evaluate(&installer));

        settings.admin_enabled = false;
        assert!(!admin_access_evaluator(&settings).evaluate(&installer));
    }

    #[test]
    fn test_read_plugin_evaluator_scope() {
        assert_eq!(
            read_plugin_evaluator("clock"),
            Evaluator::scoped("plugins:read", "plugins:id:clock")
        );
        assert_eq!(
            app_access_evaluator("clock"),
            Evaluator::scoped("plugins.app:access", "plugins:id:clock")
        );
    }

    #[test]
    fn test_req_can_read_plugin() {
        let viewer = SignedInUser::new(3, 1, OrgRole::Viewer);
        let admin = SignedInUser::new(4, 1, OrgRole::Admin);
        let anonymous = SignedInUser::new(0, 1, OrgRole::Viewer);

        let core = req_can_read_plugin(&PluginInfo::core("graph"));
        assert!(core(&viewer));
        assert!(core(&admin));
        assert!(!core(&anonymous));

        let external = req_can_read_plugin(&PluginInfo::external("clock"));
        assert!(!external(&viewer));
        assert!(external(&admin));
    }

    #[test]
    fn test_scope_constants() {
        assert_eq!(CORE_SCOPE, SCOPE_PROVIDER.class_scope("core"));
        assert_eq!(EXTERNAL_SCOPE, SCOPE_PROVIDER.class_scope("external"));
        assert!(CORE_SCOPE.starts_with(CLASS_BASED_SCOPE_PREFIX));
    }
}
