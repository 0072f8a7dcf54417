//! Builds canonical scope strings for one resource namespace

use super::types::{CLASS_ATTRIBUTE, ID_ATTRIBUTE, WILDCARD};

/// Scope string builder bound to a namespace
///
/// # Examples
///
/// ```
/// use plugin_access::scope::ScopeProvider;
///
/// let provider = ScopeProvider::new("plugins");
/// assert_eq!(provider.resource_scope("my-plugin"), "plugins:id:my-plugin");
/// assert_eq!(provider.resource_all_scope(), "plugins:*");
/// assert_eq!(provider.class_scope("core"), "plugins:class:core");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeProvider {
    namespace: &'static str,
}

impl ScopeProvider {
    pub const fn new(namespace: &'static str) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// `<ns>:id:<id>`
    pub fn resource_scope(&self, id: &str) -> String {
        format!("{}:{}:{}", self.namespace, ID_ATTRIBUTE, id)
    }

    /// `<ns>:id:`, the prefix owned by an identifier resolver
    pub fn id_prefix(&self) -> String {
        self.resource_scope("")
    }

    /// `<ns>:*`
    pub fn resource_all_scope(&self) -> String {
        format!("{}:{}", self.namespace, WILDCARD)
    }

    /// `<ns>:id:*`
    pub fn resource_all_id_scope(&self) -> String {
        self.resource_scope(WILDCARD)
    }

    /// `<ns>:class:<class>`
    pub fn class_scope(&self, class: &str) -> String {
        format!("{}:{}:{}", self.namespace, CLASS_ATTRIBUTE, class)
    }
}
