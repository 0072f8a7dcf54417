//! Core access-control types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Organization identifier
pub type OrgId = i64;

/// User identifier
pub type UserId = i64;

/// A single grant: an action, optionally narrowed to a scope
///
/// An empty scope means the action applies without qualification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Action identifier (e.g., "plugins:write")
    pub action: String,

    /// Scope the action applies to (e.g., "plugins:*"), empty for global
    #[serde(default)]
    pub scope: String,
}

impl Permission {
    /// Create a scoped permission
    pub fn new(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            scope: scope.into(),
        }
    }

    /// Create a permission without a scope
    pub fn global(action: impl Into<String>) -> Self {
        Self::new(action, "")
    }
}

/// Permissions held by a caller within one organization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    permissions: HashSet<Permission>,
}

impl PermissionSet {
    /// Create an empty permission set
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any permission carries the given action
    pub fn contains_action(&self, action: &str) -> bool {
        self.permissions.iter().any(|p| p.action == action)
    }

    /// Scopes granted for an action
    pub fn scopes_for<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.permissions
            .iter()
            .filter(move |p| p.action == action)
            .map(|p| p.scope.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.permissions.extend(iter);
    }
}

/// Organization role tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgRole {
    None,
    Viewer,
    Editor,
    Admin,
}

impl OrgRole {
    pub const ALL: [OrgRole; 4] = [OrgRole::None, OrgRole::Viewer, OrgRole::Editor, OrgRole::Admin];

    /// True if this tier inherits the grants of `other`
    ///
    /// Admin includes Editor and Viewer, Editor includes Viewer.
    /// None only includes itself.
    pub fn includes(self, other: OrgRole) -> bool {
        match self {
            OrgRole::None => other == OrgRole::None,
            OrgRole::Viewer => other == OrgRole::Viewer,
            OrgRole::Editor => matches!(other, OrgRole::Viewer | OrgRole::Editor),
            OrgRole::Admin => matches!(other, OrgRole::Viewer | OrgRole::Editor | OrgRole::Admin),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrgRole::None => "None",
            OrgRole::Viewer => "Viewer",
            OrgRole::Editor => "Editor",
            OrgRole::Admin => "Admin",
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-wide super-admin grant target
pub const ROLE_GRAFANA_ADMIN: &str = "Grafana Admin";

/// Target of an automatic fixed-role grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuiltinRole {
    /// An organization tier
    Org(OrgRole),
    /// Cross-organization super admin
    GrafanaAdmin,
}

impl BuiltinRole {
    /// Builtin roles held by a caller, including inherited org tiers
    pub fn held_by(user: &SignedInUser) -> Vec<BuiltinRole> {
        let mut held: Vec<BuiltinRole> = OrgRole::ALL
            .into_iter()
            .filter(|role| user.org_role.includes(*role))
            .map(BuiltinRole::Org)
            .collect();

        if user.is_grafana_admin {
            held.push(BuiltinRole::GrafanaAdmin);
        }

        held
    }
}

impl fmt::Display for BuiltinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltinRole::Org(role) => f.write_str(role.as_str()),
            BuiltinRole::GrafanaAdmin => f.write_str(ROLE_GRAFANA_ADMIN),
        }
    }
}

impl FromStr for BuiltinRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(BuiltinRole::Org(OrgRole::None)),
            "Viewer" => Ok(BuiltinRole::Org(OrgRole::Viewer)),
            "Editor" => Ok(BuiltinRole::Org(OrgRole::Editor)),
            "Admin" => Ok(BuiltinRole::Org(OrgRole::Admin)),
            ROLE_GRAFANA_ADMIN => Ok(BuiltinRole::GrafanaAdmin),
            other => Err(format!("unknown builtin role '{}'", other)),
        }
    }
}

impl TryFrom<String> for BuiltinRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuiltinRole> for String {
    fn from(role: BuiltinRole) -> Self {
        role.to_string()
    }
}

/// Authenticated caller within one organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInUser {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub org_role: OrgRole,

    /// Cross-organization super-admin attribute
    #[serde(default)]
    pub is_grafana_admin: bool,
}

impl SignedInUser {
    pub fn new(user_id: UserId, org_id: OrgId, org_role: OrgRole) -> Self {
        Self {
            user_id,
            org_id,
            org_role,
            is_grafana_admin: false,
        }
    }

    /// Mark the caller as a server-wide admin
    pub fn with_grafana_admin(mut self, is_grafana_admin: bool) -> Self {
        self.is_grafana_admin = is_grafana_admin;
        self
    }

    /// Anonymous callers carry no user id
    pub fn is_signed_in(&self) -> bool {
        self.user_id > 0
    }
}
