//! Decision counters for evaluation observability

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::ResolutionError;

/// Evaluation counters and latency summary
#[derive(Debug, Clone, Default)]
pub struct EvaluationMetrics {
    /// Evaluations that produced a decision or an error
    pub total_evaluations: u64,

    pub allowed_decisions: u64,

    pub denied_decisions: u64,

    /// Evaluations that failed (counted as denied at fail-closed call sites)
    pub error_count: u64,

    /// Subset of errors caused by a missing entity
    pub not_found_count: u64,

    /// Subset of errors caused by cancellation or deadline
    pub cancelled_count: u64,

    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl EvaluationMetrics {
    /// Share of successful evaluations that allowed access
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Collects [`EvaluationMetrics`] across concurrent evaluations
pub struct MetricsCollector {
    metrics: Arc<RwLock<EvaluationMetrics>>,

    /// Recent latency samples for percentiles
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EvaluationMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(1_024))),
            max_samples: 1_024,
        }
    }

    pub async fn record_decision(&self, allowed: bool, latency: Duration) {
        {
            let mut metrics = self.metrics.write().await;
            metrics.total_evaluations += 1;
            if allowed {
                metrics.allowed_decisions += 1;
            } else {
                metrics.denied_decisions += 1;
            }
        }
        self.record_latency(latency).await;
    }

    pub async fn record_error(&self, error: Option<&ResolutionError>, latency: Duration) {
        {
            let mut metrics = self.metrics.write().await;
            metrics.total_evaluations += 1;
            metrics.error_count += 1;
            match error {
                Some(ResolutionError::EntityNotFound(_)) => metrics.not_found_count += 1,
                Some(ResolutionError::Cancelled) => metrics.cancelled_count += 1,
                _ => {}
            }
        }
        self.record_latency(latency).await;
    }

    async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);
        if samples.len() > self.max_samples {
            let excess = samples.len() - self.max_samples;
            samples.drain(0..excess);
        }
    }

    /// Snapshot of the counters with latency summarized from recent samples
    pub async fn get_metrics(&self) -> EvaluationMetrics {
        let mut metrics = self.metrics.read().await.clone();

        let mut sorted = self.latency_samples.read().await.clone();
        if !sorted.is_empty() {
            sorted.sort_by(|a, b| a.total_cmp(b));
            metrics.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
            metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
        }

        metrics
    }

    pub async fn reset(&self) {
        *self.metrics.write().await = EvaluationMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export counters in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics().await;

        format!(
            r#"# HELP accesscontrol_evaluations_total Total number of evaluations
# TYPE accesscontrol_evaluations_total counter
accesscontrol_evaluations_total {}

# HELP accesscontrol_allowed_total Evaluations that allowed access
# TYPE accesscontrol_allowed_total counter
accesscontrol_allowed_total {}

# HELP accesscontrol_denied_total Evaluations that denied access
# TYPE accesscontrol_denied_total counter
accesscontrol_denied_total {}

# HELP accesscontrol_errors_total Evaluations that failed
# TYPE accesscontrol_errors_total counter
accesscontrol_errors_total {}

# HELP accesscontrol_latency_seconds Evaluation latency percentiles
# TYPE accesscontrol_latency_seconds summary
accesscontrol_latency_seconds{{quantile="0.5"}} {}
accesscontrol_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_evaluations,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.error_count,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_decisions() {
        let collector = MetricsCollector::new();

        collector.record_decision(true, Duration::from_millis(1)).await;
        collector.record_decision(false, Duration::from_millis(3)).await;
        collector
            .record_error(Some(&ResolutionError::EntityNotFound("x".into())), Duration::from_millis(2))
            .await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_evaluations, 3);
        assert_eq!(metrics.allowed_decisions, 1);
        assert_eq!(metrics.denied_decisions, 1);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.not_found_count, 1);
        assert!((metrics.allow_rate() - 0.5).abs() < f64::EPSILON);
        assert!((metrics.avg_latency_ms - 2.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_latency_percentiles_follow_samples() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.get_metrics().await.latency_p99_ms, 0.0);

        for ms in (1..=100).rev() {
            collector.record_decision(true, Duration::from_millis(ms)).await;
        }

        let metrics = collector.get_metrics().await;
        assert!((metrics.latency_p50_ms - 51.0).abs() < 0.01);
        assert!((metrics.latency_p99_ms - 100.0).abs() < 0.01);
        assert!((metrics.avg_latency_ms - 50.5).abs() < 0.01);

        collector.record_decision(false, Duration::from_millis(1_000)).await;
        assert!((collector.get_metrics().await.latency_p99_ms - 100.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_sample_window_is_bounded() {
        let collector = MetricsCollector::new();
        for _ in 0..collector.max_samples {
            collector.record_decision(true, Duration::from_millis(100)).await;
        }
        for _ in 0..collector.max_samples {
            collector.record_decision(true, Duration::from_millis(1)).await;
        }

        assert_eq!(collector.latency_samples.read().await.len(), collector.max_samples);
        let metrics = collector.get_metrics().await;
        assert!((metrics.latency_p99_ms - 1.0).abs() < 0.01);
        assert_eq!(metrics.total_evaluations, 2 * collector.max_samples as u64);
    }

    #[tokio::test]
    async fn test_prometheus_export_and_reset() {
        let collector = MetricsCollector::new();
        collector.record_decision(true, Duration::from_millis(1)).await;

        let text = collector.export_prometheus().await;
        assert!(text.contains("accesscontrol_evaluations_total 1"));
        assert!(text.contains("accesscontrol_allowed_total 1"));
        assert!(text.contains("accesscontrol_latency_seconds{quantile=\"0.5\"} 0.00"));

        collector.reset().await;
        assert_eq!(collector.get_metrics().await.total_evaluations, 0);
    }
}
