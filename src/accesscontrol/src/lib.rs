//! # Plugin Access Control
//!
//! Role-based access control for plugin administration.
//!
//! ## Features
//!
//! - **Evaluator trees** combining permission leaves with `all` / `any`
//! - **Scope resolution** through a prefix-keyed resolver table, honouring
//!   request cancellation and deadlines
//! - **Fixed roles** declared at startup and granted to builtin roles
//! - **Plugin admin gate** that follows the plugin installation settings
//! - **Background maintenance** for usage metrics and token leak checks
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use plugin_access::config::PluginSettings;
//! use plugin_access::plugins::{self, InMemoryPluginStore, PluginInfo};
//! use plugin_access::{AccessControl, InMemoryPermissionStore, Permission, RequestContext, ScopeResolvers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plugin_store = Arc::new(InMemoryPluginStore::new());
//!     plugin_store.install(PluginInfo::external("clock-panel")).await;
//!
//!     let mut builder = ScopeResolvers::builder();
//!     plugins::register_resolvers(&mut builder, plugin_store)?;
//!
//!     let permissions = Arc::new(InMemoryPermissionStore::new());
//!     permissions
//!         .grant(1, 7, vec![Permission::new("plugins:read", "plugins:class:external")])
//!         .await;
//!
//!     let ac = AccessControl::new(permissions, Arc::new(builder.build()));
//!     let ctx = RequestContext::new();
//!
//!     assert!(ac.evaluate(&ctx, 1, 7, &plugins::read_plugin_evaluator("clock-panel")).await?);
//!     assert!(ac.evaluate(&ctx, 1, 7, &plugins::admin_access_evaluator(&PluginSettings::new(true))).await?);
//!
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod maintenance;
pub mod plugins;
pub mod roles;
pub mod scope;
pub mod types;

// Re-export commonly used types
pub use access::{AccessControl, InMemoryPermissionStore, PermissionStore};
pub use config::Settings;
pub use context::RequestContext;
pub use error::{AccessControlError, ResolutionError, Result};
pub use evaluator::Evaluator;
pub use roles::{FixedRoleRegistry, RoleRegistration, RoleRegistrationSink};
pub use scope::{ScopeAttributeResolver, ScopeResolvers};
pub use types::{BuiltinRole, OrgId, OrgRole, Permission, PermissionSet, SignedInUser, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
