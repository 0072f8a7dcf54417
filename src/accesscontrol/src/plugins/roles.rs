//! Fixed roles owned by the plugins subsystem

use tracing::info;

use super::{ACTION_APP_ACCESS, ACTION_INSTALL, ACTION_READ, ACTION_WRITE, CORE_SCOPE, EXTERNAL_SCOPE, SCOPE_PROVIDER};
use crate::config::PluginSettings;
use crate::error::Result;
use crate::roles::{RoleDto, RoleRegistration, RoleRegistrationSink, FIXED_ROLE_PREFIX};
use crate::types::{BuiltinRole, OrgRole, Permission};

const GROUP: &str = "Plugins";

pub const APP_READER_ROLE: &str = "plugins.app:reader";
pub const READER_ROLE: &str = "plugins:reader";
pub const WRITER_ROLE: &str = "plugins:writer";
pub const MAINTAINER_ROLE: &str = "plugins:maintainer";
pub const EXTERNAL_READER_ROLE: &str = "plugins.external:reader";

/// Full fixed role name, e.g. `fixed:plugins:writer`
pub fn fixed_role_name(role: &str) -> String {
    format!("{}{}", FIXED_ROLE_PREFIX, role)
}

fn registration(
    role: &str,
    display_name: &str,
    description: &str,
    permissions: Vec<Permission>,
    grants: Vec<BuiltinRole>,
) -> RoleRegistration {
    RoleRegistration::new(
        RoleDto {
            name: fixed_role_name(role),
            display_name: display_name.to_string(),
            description: description.to_string(),
            group: GROUP.to_string(),
            permissions,
        },
        grants,
    )
}

/// Build the plugin role catalog for the given settings
///
/// The maintainer role is only granted to server admins when installation
/// is enabled and not delegated to an external manager; otherwise it is
/// declared without grants.
pub fn plugin_role_registrations(settings: &PluginSettings) -> Vec<RoleRegistration> {
    let app_reader = registration(
        APP_READER_ROLE,
        "Application Plugins Access",
        "Access application plugins (still enforcing the organization role)",
        vec![Permission::new(ACTION_APP_ACCESS, SCOPE_PROVIDER.resource_all_scope())],
        vec![BuiltinRole::Org(OrgRole::Viewer)],
    );

    let reader = registration(
        READER_ROLE,
        "Plugin Reader",
        "List plugins and their settings",
        vec![Permission::new(ACTION_READ, CORE_SCOPE)],
        vec![BuiltinRole::Org(OrgRole::Viewer)],
    );

    let writer = registration(
        WRITER_ROLE,
        "Plugin Writer",
        "Enable and disable plugins and edit plugins' settings",
        vec![Permission::new(ACTION_WRITE, SCOPE_PROVIDER.resource_all_scope())],
        vec![BuiltinRole::Org(OrgRole::Admin)],
    );

    let maintainer_grants = if settings.admin_enabled && !settings.admin_external_manage_enabled {
        vec![BuiltinRole::GrafanaAdmin]
    } else {
        Vec::new()
    };
    let maintainer = registration(
        MAINTAINER_ROLE,
        "Plugin Maintainer",
        "Install, uninstall plugins",
        vec![Permission::global(ACTION_INSTALL)],
        maintainer_grants,
    );

    let external_reader = registration(
        EXTERNAL_READER_ROLE,
        "External Plugin Reader",
        "List non core plugins and their settings",
        vec![Permission::new(ACTION_READ, EXTERNAL_SCOPE)],
        vec![BuiltinRole::Org(OrgRole::Admin), BuiltinRole::GrafanaAdmin],
    );

    vec![app_reader, reader, writer, maintainer, external_reader]
}

/// Declare the plugin fixed roles
pub async fn declare_rbac_roles(sink: &dyn RoleRegistrationSink, settings: &PluginSettings) -> Result<()> {
    let registrations = plugin_role_registrations(settings);
    sink.declare_fixed_roles(&registrations).await?;

    info!(
        "Declared {} plugin roles (install enabled={}, externally managed={})",
        registrations.len(),
        settings.admin_enabled,
        settings.admin_external_manage_enabled
    );
    Ok(())
}
