//! Periodic background maintenance
//!
//! Collects usage metrics on a fixed interval and, when enabled, runs a
//! leaked-token check on a shorter one. Failures are logged and the loop
//! keeps going; only the cancellation token ends it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{AccessControlError, Result};
use crate::roles::FixedRoleRegistry;

/// Default usage metrics interval
pub const METRICS_COLLECTION_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default leaked-token check interval
pub const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Source of usage statistics
#[async_trait]
pub trait UsageMetricsSource: Send + Sync {
    async fn usage_metrics(&self) -> Result<HashMap<String, i64>>;
}

/// Scans for leaked tokens, returning how many were found
#[async_trait]
pub trait TokenLeakChecker: Send + Sync {
    async fn check_leaks(&self) -> Result<usize>;
}

/// Last collected usage statistics
#[derive(Debug, Clone)]
pub struct UsageSnapshot {
    pub metrics: HashMap<String, i64>,
    pub collected_at: DateTime<Utc>,
}

/// Usage statistics about declared fixed roles
pub struct RoleUsageMetrics {
    registry: Arc<FixedRoleRegistry>,
}

impl RoleUsageMetrics {
    pub fn new(registry: Arc<FixedRoleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl UsageMetricsSource for RoleUsageMetrics {
    async fn usage_metrics(&self) -> Result<HashMap<String, i64>> {
        let snapshot = self.registry.snapshot();
        let granted = snapshot.registrations().filter(|r| !r.grants.is_empty()).count();

        Ok(HashMap::from([
            ("stats.accesscontrol.fixed_roles.count".to_string(), snapshot.len() as i64),
            ("stats.accesscontrol.fixed_roles.granted.count".to_string(), granted as i64),
        ]))
    }
}

/// Background maintenance loop
pub struct BackgroundService {
    usage_source: Arc<dyn UsageMetricsSource>,
    leak_checker: Option<Arc<dyn TokenLeakChecker>>,
    check_token_leaks: bool,
    metrics_interval: Duration,
    token_check_interval: Duration,
    last_usage: RwLock<Option<UsageSnapshot>>,
    token_checks: AtomicU64,
}

impl BackgroundService {
    pub fn new(usage_source: Arc<dyn UsageMetricsSource>) -> Self {
        Self {
            usage_source,
            leak_checker: None,
            check_token_leaks: false,
            metrics_interval: METRICS_COLLECTION_INTERVAL,
            token_check_interval: TOKEN_CHECK_INTERVAL,
            last_usage: RwLock::new(None),
            token_checks: AtomicU64::new(0),
        }
    }

    /// Configure intervals and the token check from settings
    pub fn from_settings(settings: &Settings, usage_source: Arc<dyn UsageMetricsSource>) -> Self {
        Self::new(usage_source)
            .with_intervals(
                settings.maintenance.metrics_interval(),
                settings.maintenance.token_check_interval(),
            )
            .with_token_leak_check(settings.security.check_token_leaks)
    }

    pub fn with_intervals(mut self, metrics_interval: Duration, token_check_interval: Duration) -> Self {
        self.metrics_interval = metrics_interval;
        self.token_check_interval = token_check_interval;
        self
    }

    pub fn with_token_leak_check(mut self, enabled: bool) -> Self {
        self.check_token_leaks = enabled;
        self
    }

    /// Checker invoked on every token tick; enables the check
    pub fn with_leak_checker(mut self, checker: Arc<dyn TokenLeakChecker>) -> Self {
        self.leak_checker = Some(checker);
        self.check_token_leaks = true;
        self
    }

    pub fn last_usage(&self) -> Option<UsageSnapshot> {
        self.last_usage.read().clone()
    }

    /// Number of token checks run so far
    pub fn token_checks(&self) -> u64 {
        self.token_checks.load(Ordering::Relaxed)
    }

    /// Run until `cancel` fires
    ///
    /// Always ends with [`AccessControlError::Cancelled`] so callers can tell
    /// a requested stop from a task that died.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        debug!("Background service initialized");

        self.collect_usage().await;

        let start = Instant::now();
        let mut stats_ticker = ticker(start, self.metrics_interval);
        let mut token_ticker = if self.check_token_leaks {
            debug!("Enabled token leak check");
            Some(ticker(start, self.token_check_interval))
        } else {
            None
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Stopped background service");
                    return Err(AccessControlError::Cancelled);
                }
                _ = stats_ticker.tick() => {
                    debug!("Updating usage metrics");
                    self.collect_usage().await;
                }
                _ = tick_optional(&mut token_ticker) => {
                    debug!("Checking for leaked tokens");
                    self.check_tokens().await;
                }
            }
        }
    }

    /// Run on a tokio task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn collect_usage(&self) {
        match self.usage_source.usage_metrics().await {
            Ok(metrics) => {
                *self.last_usage.write() = Some(UsageSnapshot {
                    metrics,
                    collected_at: Utc::now(),
                });
            }
            Err(e) => warn!("Failed to get usage metrics: {}", e),
        }
    }

    async fn check_tokens(&self) {
        self.token_checks.fetch_add(1, Ordering::Relaxed);

        let Some(checker) = &self.leak_checker else {
            return;
        };

        match checker.check_leaks().await {
            Ok(0) => {}
            Ok(leaked) => warn!("Found {} leaked tokens", leaked),
            Err(e) => warn!("Failed to check for leaked tokens: {}", e),
        }
    }
}

/// Interval whose first tick is one period after `start`
fn ticker(start: Instant, period: Duration) -> Interval {
    let mut interval = interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick_optional(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}
