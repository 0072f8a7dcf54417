//! Settings loading and environment overrides
//!
//! Settings come from a TOML file; any key can be overridden with an
//! environment variable named `PLUGIN_ACCESS_<SECTION>_<KEY>`, e.g.
//! `PLUGIN_ACCESS_SECURITY_CHECK_TOKEN_LEAKS=true`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PLUGIN_ACCESS";

/// Complete settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub plugins: PluginSettings,

    #[serde(default)]
    pub security: SecuritySettings,

    #[serde(default)]
    pub maintenance: MaintenanceSettings,
}

/// Plugin administration flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginSettings {
    /// Plugins can be installed from the admin page
    #[serde(default)]
    pub admin_enabled: bool,

    /// Installation is handled by an external system
    #[serde(default)]
    pub admin_external_manage_enabled: bool,

    /// Known plugins used to seed the in-memory plugin store
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

impl PluginSettings {
    pub fn new(admin_enabled: bool) -> Self {
        Self {
            admin_enabled,
            ..Self::default()
        }
    }

    pub fn with_external_manage(mut self, enabled: bool) -> Self {
        self.admin_external_manage_enabled = enabled;
        self
    }
}

/// A plugin known at startup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub id: String,

    /// Ships with the server
    #[serde(default)]
    pub core: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecuritySettings {
    /// Enable the periodic leaked-token check
    #[serde(default)]
    pub check_token_leaks: bool,
}

/// Background maintenance intervals
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MaintenanceSettings {
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,

    #[serde(default = "default_token_check_interval")]
    pub token_check_interval_secs: u64,
}

impl MaintenanceSettings {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs.max(1))
    }

    pub fn token_check_interval(&self) -> Duration {
        Duration::from_secs(self.token_check_interval_secs.max(1))
    }
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            metrics_interval_secs: default_metrics_interval(),
            token_check_interval_secs: default_token_check_interval(),
        }
    }
}

fn default_metrics_interval() -> u64 {
    30 * 60
}

fn default_token_check_interval() -> u64 {
    10 * 60
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// Unparsable values are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |section: &str, key: &str| {
            let name = format!("{}_{}_{}", ENV_PREFIX, section, key).to_uppercase();
            lookup(&name).map(|value| (name, value))
        };

        override_bool(&mut self.plugins.admin_enabled, var("plugins", "admin_enabled"));
        override_bool(
            &mut self.plugins.admin_external_manage_enabled,
            var("plugins", "admin_external_manage_enabled"),
        );
        override_bool(&mut self.security.check_token_leaks, var("security", "check_token_leaks"));
        override_u64(
            &mut self.maintenance.metrics_interval_secs,
            var("maintenance", "metrics_interval_secs"),
        );
        override_u64(
            &mut self.maintenance.token_check_interval_secs,
            var("maintenance", "token_check_interval_secs"),
        );

        self
    }
}

fn override_bool(target: &mut bool, value: Option<(String, String)>) {
    let Some((name, value)) = value else { return };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *target = true,
        "false" | "0" | "no" | "off" => *target = false,
        _ => warn!("Ignoring {}: '{}' is not a boolean", name, value),
    }
}

fn override_u64(target: &mut u64, value: Option<(String, String)>) {
    let Some((name, value)) = value else { return };
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("Ignoring {}: '{}' is not a number", name, value),
    }
}
