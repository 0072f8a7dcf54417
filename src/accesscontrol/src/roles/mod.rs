//! Fixed role declarations
//!
//! Fixed roles are predeclared, non-editable bundles of permissions. Each
//! [`RoleRegistration`] names the builtin roles (org tiers or the server
//! admin) that receive the role automatically; an empty grant list declares
//! the role without binding it to anyone.
//!
//! Declarations go through a [`RoleRegistrationSink`]. The in-process
//! implementation is [`FixedRoleRegistry`].

mod registry;

pub use registry::{FixedRoleRegistry, RegistrySnapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AccessControlError, Result};
use crate::types::{BuiltinRole, Permission};

/// Prefix every fixed role name carries
pub const FIXED_ROLE_PREFIX: &str = "fixed:";

/// Role definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDto {
    /// Unique role name (e.g., "fixed:plugins:writer")
    pub name: String,

    /// Human readable name
    pub display_name: String,

    pub description: String,

    /// UI grouping (e.g., "Plugins")
    pub group: String,

    pub permissions: Vec<Permission>,
}

/// A role together with the builtin roles it is granted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistration {
    pub role: RoleDto,

    #[serde(default)]
    pub grants: Vec<BuiltinRole>,
}

impl RoleRegistration {
    pub fn new(role: RoleDto, grants: Vec<BuiltinRole>) -> Self {
        Self { role, grants }
    }

    /// Validate the declaration
    ///
    /// Names must be non-empty and carry [`FIXED_ROLE_PREFIX`]; every
    /// permission needs an action.
    pub fn validate(&self) -> Result<()> {
        let name = &self.role.name;

        if name.is_empty() {
            return Err(AccessControlError::Configuration(
                "fixed role name cannot be empty".to_string(),
            ));
        }

        if !name.starts_with(FIXED_ROLE_PREFIX) || name.len() == FIXED_ROLE_PREFIX.len() {
            return Err(AccessControlError::Configuration(format!(
                "fixed role '{}' must be named '{}<name>'",
                name, FIXED_ROLE_PREFIX
            )));
        }

        if let Some(permission) = self.role.permissions.iter().find(|p| p.action.is_empty()) {
            return Err(AccessControlError::Configuration(format!(
                "fixed role '{}' has a permission without action (scope '{}')",
                name, permission.scope
            )));
        }

        Ok(())
    }

    pub fn is_granted_to(&self, builtin: &BuiltinRole) -> bool {
        self.grants.contains(builtin)
    }
}

/// Backing store that applies fixed role declarations
#[async_trait]
pub trait RoleRegistrationSink: Send + Sync {
    /// Declare a batch of fixed roles
    ///
    /// A failing batch must not be partially applied.
    async fn declare_fixed_roles(&self, registrations: &[RoleRegistration]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrgRole;

    fn role(name: &str) -> RoleDto {
        RoleDto {
            name: name.to_string(),
            display_name: "Test".to_string(),
            description: "Test role".to_string(),
            group: "Tests".to_string(),
            permissions: vec![Permission::global("tests:run")],
        }
    }

    #[test]
    fn test_validation() {
        assert!(RoleRegistration::new(role("fixed:tests:runner"), vec![]).validate().is_ok());
        assert!(RoleRegistration::new(role(""), vec![]).validate().is_err());
        assert!(RoleRegistration::new(role("tests:runner"), vec![]).validate().is_err());
        assert!(RoleRegistration::new(role("fixed:"), vec![]).validate().is_err());

        let mut bad = role("fixed:tests:runner");
        bad.permissions.push(Permission::new("", "tests:*"));
        let err = RoleRegistration::new(bad, vec![]).validate().unwrap_err();
        assert!(matches!(err, AccessControlError::Configuration(_)));
    }

    #[test]
    fn test_grants() {
        let registration = RoleRegistration::new(
            role("fixed:tests:runner"),
            vec![BuiltinRole::Org(OrgRole::Viewer), BuiltinRole::GrafanaAdmin],
        );

        assert!(registration.is_granted_to(&BuiltinRole::GrafanaAdmin));
        assert!(!registration.is_granted_to(&BuiltinRole::Org(OrgRole::Admin)));
    }

    #[test]
    fn test_registration_json() {
        let registration = RoleRegistration::new(
            role("fixed:tests:runner"),
            vec![BuiltinRole::Org(OrgRole::Admin), BuiltinRole::GrafanaAdmin],
        );

        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["grants"], serde_json::json!(["Admin", "Grafana Admin"]));

        let decoded: RoleRegistration = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, registration);
    }
}
