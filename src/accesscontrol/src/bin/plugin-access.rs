//! Plugin Access Control - command line
//!
//! Inspects the plugin role catalog, answers access questions for a caller
//! and runs the background maintenance loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plugin_access::maintenance::{BackgroundService, RoleUsageMetrics};
use plugin_access::plugins::{self, InMemoryPluginStore};
use plugin_access::{
    AccessControl, AccessControlError, BuiltinRole, FixedRoleRegistry, InMemoryPermissionStore, OrgRole,
    RequestContext, ScopeResolvers, Settings, SignedInUser,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Plugin access control CLI
#[derive(Parser)]
#[command(name = "plugin-access")]
#[command(about = "Role-based access control for plugin administration")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PLUGIN_ACCESS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the declared fixed roles as JSON
    Roles,

    /// Decide plugin access for a caller
    Check {
        /// Organization role (None, Viewer, Editor, Admin)
        #[arg(short, long, default_value = "Viewer", value_parser = parse_org_role)]
        role: OrgRole,

        /// Caller is a server admin
        #[arg(long)]
        grafana_admin: bool,

        /// Also check read access to this plugin
        #[arg(short, long)]
        plugin: Option<String>,
    },

    /// Run background maintenance until interrupted
    Run,
}

fn parse_org_role(value: &str) -> Result<OrgRole, String> {
    match value.parse::<BuiltinRole>()? {
        BuiltinRole::Org(role) => Ok(role),
        BuiltinRole::GrafanaAdmin => Err("use --grafana-admin for server admins".to_string()),
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    Ok(settings.with_env_overrides())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},plugin_access={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.config.as_ref())?;

    let registry = Arc::new(FixedRoleRegistry::new());
    plugins::declare_rbac_roles(&*registry, &settings.plugins)
        .await
        .context("failed to declare plugin roles")?;

    match cli.command {
        Command::Roles => {
            let snapshot = registry.snapshot();
            let roles: Vec<_> = snapshot.registrations().collect();
            println!("{}", serde_json::to_string_pretty(&roles)?);
        }
        Command::Check {
            role,
            grafana_admin,
            plugin,
        } => check(&settings, registry, role, grafana_admin, plugin).await?,
        Command::Run => run(&settings, registry).await?,
    }

    Ok(())
}

async fn check(
    settings: &Settings,
    registry: Arc<FixedRoleRegistry>,
    role: OrgRole,
    grafana_admin: bool,
    plugin: Option<String>,
) -> Result<()> {
    let user = SignedInUser::new(1, 1, role).with_grafana_admin(grafana_admin);

    let plugin_store = Arc::new(InMemoryPluginStore::from_catalog(&settings.plugins.catalog));
    let mut builder = ScopeResolvers::builder();
    plugins::register_resolvers(&mut builder, plugin_store)?;

    let permissions = Arc::new(InMemoryPermissionStore::new());
    permissions
        .grant(user.org_id, user.user_id, registry.permissions_for(&user).iter().cloned())
        .await;

    let ac = AccessControl::new(permissions, Arc::new(builder.build()));
    let ctx = RequestContext::new();

    let admin = ac
        .evaluate_user(&ctx, &user, &plugins::admin_access_evaluator(&settings.plugins))
        .await?;
    let legacy = plugins::req_can_admin_plugins(&settings.plugins, Arc::clone(&registry))(&user);
    println!("admin page: {} (legacy: {})", verdict(admin), verdict(legacy));

    if let Some(plugin_id) = plugin {
        match ac
            .evaluate_user(&ctx, &user, &plugins::read_plugin_evaluator(&plugin_id))
            .await
        {
            Ok(allowed) => println!("read {}: {}", plugin_id, verdict(allowed)),
            Err(e) if e.is_not_found() => println!("read {}: not installed", plugin_id),
            Err(e) => return Err(e).context("failed to evaluate plugin access"),
        }
    }

    Ok(())
}

fn verdict(allowed: bool) -> &'static str {
    if allowed {
        "ALLOW"
    } else {
        "DENY"
    }
}

async fn run(settings: &Settings, registry: Arc<FixedRoleRegistry>) -> Result<()> {
    info!("Starting plugin access maintenance v{}", plugin_access::VERSION);

    let service = Arc::new(BackgroundService::from_settings(
        settings,
        Arc::new(RoleUsageMetrics::new(registry)),
    ));
    let cancel = CancellationToken::new();
    let handle = Arc::clone(&service).spawn(cancel.clone());

    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();

    match handle.await.context("background service panicked")? {
        Ok(()) | Err(AccessControlError::Cancelled) => {}
        Err(e) => {
            error!("Background service failed: {}", e);
            return Err(e.into());
        }
    }

    if let Some(usage) = service.last_usage() {
        info!(
            "Last usage collection at {}: {:?}",
            usage.collected_at.to_rfc3339(),
            usage.metrics
        );
    }

    info!("Stopped");
    Ok(())
}
