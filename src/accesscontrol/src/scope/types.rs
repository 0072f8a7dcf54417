//! Scope type definitions and matching
//!
//! Scopes travel as plain strings (`plugins:id:my-plugin`, `plugins:*`).
//! `ParsedScope` is the structured form used where the segments matter.

use std::fmt;
use std::str::FromStr;

use crate::error::ResolutionError;

/// Scope matching everything
pub const WILDCARD: &str = "*";

/// Attribute used for identifier scopes
pub const ID_ATTRIBUTE: &str = "id";

/// Attribute used for classification scopes
pub const CLASS_ATTRIBUTE: &str = "class";

/// What the attribute segment of a scope refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// `<ns>:id:<value>`
    Id,
    /// `<ns>:class:<value>`
    Class,
    /// `<ns>:*`
    Wildcard,
    /// `<ns>:<attribute>:<value>` for any other attribute
    Other(String),
}

/// Structured representation of a scope string
///
/// # Examples
///
/// ```
/// use plugin_access::scope::{ParsedScope, ScopeKind};
///
/// let scope = ParsedScope::parse("plugins:id:my-plugin").unwrap();
/// assert_eq!(scope.namespace(), "plugins");
/// assert_eq!(scope.kind(), &ScopeKind::Id);
/// assert_eq!(scope.value(), "my-plugin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedScope {
    namespace: String,
    kind: ScopeKind,
    value: String,
}

impl ParsedScope {
    /// Parse a scope string, rejecting empty input and empty segments
    pub fn parse(s: &str) -> Result<Self, ResolutionError> {
        if s.is_empty() {
            return Err(ResolutionError::InvalidScope("scope cannot be empty".to_string()));
        }

        let mut parts = s.splitn(3, ':');
        let namespace = parts.next().unwrap_or_default();
        let attribute = parts.next();
        let value = parts.next();

        if namespace.is_empty() || namespace.contains('*') {
            return Err(ResolutionError::InvalidScope(format!("invalid namespace in '{}'", s)));
        }

        let (kind, value) = match (attribute, value) {
            (Some(WILDCARD), None) => (ScopeKind::Wildcard, String::new()),
            (Some(""), _) | (None, _) => {
                return Err(ResolutionError::InvalidScope(format!(
                    "scope '{}' is missing an attribute",
                    s
                )));
            }
            (Some(_), None) | (Some(_), Some("")) => {
                return Err(ResolutionError::InvalidScope(format!(
                    "scope '{}' is missing a value",
                    s
                )));
            }
            (Some(ID_ATTRIBUTE), Some(value)) => (ScopeKind::Id, value.to_string()),
            (Some(CLASS_ATTRIBUTE), Some(value)) => (ScopeKind::Class, value.to_string()),
            (Some(attribute), Some(value)) => (ScopeKind::Other(attribute.to_string()), value.to_string()),
        };

        Ok(Self {
            namespace: namespace.to_string(),
            kind,
            value,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True for `<ns>:*` and `<ns>:<attribute>:*`
    pub fn is_wildcard(&self) -> bool {
        self.kind == ScopeKind::Wildcard || self.value == WILDCARD
    }
}

impl FromStr for ParsedScope {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ScopeKind::Wildcard => write!(f, "{}:{}", self.namespace, WILDCARD),
            ScopeKind::Id => write!(f, "{}:{}:{}", self.namespace, ID_ATTRIBUTE, self.value),
            ScopeKind::Class => write!(f, "{}:{}:{}", self.namespace, CLASS_ATTRIBUTE, self.value),
            ScopeKind::Other(attribute) => write!(f, "{}:{}:{}", self.namespace, attribute, self.value),
        }
    }
}

/// Check whether a granted scope covers a target scope
///
/// A granted scope covers the target when both are equal, when it is the
/// bare `*`, or when it ends in `:*` and the target starts with everything
/// before the `*` (so `plugins:*` covers `plugins:class:core`).
pub fn scope_matches(granted: &str, target: &str) -> bool {
    if granted == target || granted == WILDCARD {
        return true;
    }

    match granted.strip_suffix(WILDCARD) {
        Some(prefix) if prefix.ends_with(':') => target.starts_with(prefix),
        _ => false,
    }
}
