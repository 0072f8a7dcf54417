//! In-process fixed role registry
//!
//! Declarations are validated as a batch and then published by replacing an
//! immutable snapshot, so readers always see either the previous or the new
//! set of roles and never a partial batch.
//!
//! Re-declaring a role overwrites it; the last registration wins. An
//! identical re-declaration is a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{RoleDto, RoleRegistration, RoleRegistrationSink};
use crate::error::Result;
use crate::types::{BuiltinRole, PermissionSet, SignedInUser};

/// Immutable view of every declared role
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    roles: BTreeMap<String, RoleRegistration>,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&RoleRegistration> {
        self.roles.get(name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Registrations ordered by role name
    pub fn registrations(&self) -> impl Iterator<Item = &RoleRegistration> {
        self.roles.values()
    }

    /// Roles automatically granted to a builtin role
    pub fn roles_granted_to<'a>(&'a self, builtin: &'a BuiltinRole) -> impl Iterator<Item = &'a RoleDto> + 'a {
        self.roles
            .values()
            .filter(move |registration| registration.is_granted_to(builtin))
            .map(|registration| &registration.role)
    }

    /// Permissions a caller receives through builtin role grants
    ///
    /// Org tiers are expanded through inheritance, so an Admin also receives
    /// Editor and Viewer grants.
    pub fn permissions_for(&self, user: &SignedInUser) -> PermissionSet {
        let held = BuiltinRole::held_by(user);

        self.roles
            .values()
            .filter(|registration| held.iter().any(|builtin| registration.is_granted_to(builtin)))
            .flat_map(|registration| registration.role.permissions.iter().cloned())
            .collect()
    }
}

/// Registry of fixed roles and their builtin grants
#[derive(Debug, Default)]
pub struct FixedRoleRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl FixedRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap to clone and safe to hold across awaits
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn get(&self, name: &str) -> Option<RoleRegistration> {
        self.snapshot().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn permissions_for(&self, user: &SignedInUser) -> PermissionSet {
        self.snapshot().permissions_for(user)
    }

    /// Validate and apply a batch of declarations
    ///
    /// Validation failures reject the whole batch before anything is applied.
    pub fn declare(&self, registrations: &[RoleRegistration]) -> Result<()> {
        for registration in registrations {
            registration.validate()?;
        }

        let mut guard = self.snapshot.write();
        let mut next = RegistrySnapshot::clone(&guard);

        for registration in registrations {
            let name = registration.role.name.clone();
            match next.roles.get(&name) {
                Some(existing) if existing == registration => {
                    debug!("Fixed role '{}' unchanged", name);
                    continue;
                }
                Some(_) => info!("Overwriting fixed role '{}'", name),
                None => debug!(
                    "Declared fixed role '{}' granted to {:?}",
                    name,
                    registration.grants.iter().map(ToString::to_string).collect::<Vec<_>>()
                ),
            }
            next.roles.insert(name, registration.clone());
        }

        *guard = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl RoleRegistrationSink for FixedRoleRegistry {
    async fn declare_fixed_roles(&self, registrations: &[RoleRegistration]) -> Result<()> {
        self.declare(registrations)
    }
}
