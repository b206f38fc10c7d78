//! Prometheus metrics.
//!
//! Provides metrics for:
//! - HTTP request latency and counts
//! - Retention deletions and failures
//! - Username repair outcomes
//! - Statistics reads that failed soft
//!
//! Every recording function compiles to a no-op without the `prometheus`
//! feature, so call sites never need their own `cfg`.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        let status_class = format!("{}xx", status / 100);

        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string())
            .increment(1);

        histogram!("http_request_duration_seconds", "method" => method.to_string(), "path" => path.to_string(), "status_class" => status_class)
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (method, path, status, duration_secs);
    }
}

/// Record records removed by a retention pass.
pub fn record_retention_deletion(collection: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("retention_deletions_total", "collection" => collection.to_string())
            .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (collection, count);
    }
}

/// Record a retention pass that aborted on a collection.
pub fn record_retention_error(collection: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("retention_errors_total", "collection" => collection.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = collection;
    }
}

/// Record the wall-clock duration of a whole retention pass.
pub fn record_retention_run(duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!("retention_run_duration_seconds").record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = duration_secs;
    }
}

/// Record per-user results of a username repair run.
pub fn record_repair_outcomes(succeeded: usize, failed: usize) {
    #[cfg(feature = "prometheus")]
    {
        counter!("username_repairs_total", "outcome" => "success").increment(succeeded as u64);
        counter!("username_repairs_total", "outcome" => "failure").increment(failed as u64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (succeeded, failed);
    }
}

/// Record a statistics read that failed and was replaced by its default.
pub fn record_soft_read_failure(query: &'static str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("stats_read_failures_total", "query" => query).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = query;
    }
}

/// Record a stored scan.
pub fn record_scan() {
    #[cfg(feature = "prometheus")]
    {
        counter!("scans_recorded_total").increment(1);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
