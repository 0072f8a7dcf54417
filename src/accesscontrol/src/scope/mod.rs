//! Scope strings, parsing and resolution
//!
//! This module builds canonical scope strings, parses them into a tagged
//! form, matches granted scopes against targets and hosts the prefix-keyed
//! resolver table used to expand identifier scopes before evaluation.
//!
//! # Examples
//!
//! ```
//! use plugin_access::scope::{scope_matches, ScopeProvider};
//!
//! let plugins = ScopeProvider::new("plugins");
//! assert!(scope_matches(&plugins.resource_all_scope(), &plugins.class_scope("core")));
//! ```

mod provider;
mod resolver;
mod types;


pub use provider::ScopeProvider;
pub use resolver::{
    ResolutionResult, ResolverFn, ScopeAttributeResolver, ScopeResolvers, ScopeResolversBuilder,
};
pub use types::{scope_matches, ParsedScope, ScopeKind, CLASS_ATTRIBUTE, ID_ATTRIBUTE, WILDCARD};
