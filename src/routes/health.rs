//! Probes: store connectivity plus the retention policy currently in force.

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, db::Collection, retention::compute_cutoff_with_months};
#[cfg(feature = "prometheus")]
use crate::observability::metrics::get_prometheus_handle;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    /// Absent when the server runs without a store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
    pub retention: RetentionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the next retention pass would do if it ran now.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionSummary {
    pub enabled: bool,
    pub dry_run: bool,
    pub retain_months: u32,
    pub cutoff: DateTime<Utc>,
    pub collections: Vec<Collection>,
}

async fn probe_database(state: &AppState) -> Option<DatabaseHealth> {
    let db = state.db.as_ref()?;
    let start = std::time::Instant::now();
    let result = db.health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    if let Err(e) = &result {
        tracing::warn!(error = %e, "Database health check failed");
    }

    Some(DatabaseHealth {
        reachable: result.is_ok(),
        latency_ms,
        error: result.err().map(|e| e.to_string()),
    })
}

/// `GET /health`. 503 only when a configured store is unreachable.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = probe_database(&state).await;
    let healthy = database.as_ref().is_none_or(|db| db.reachable);

    let policy = &state.config.retention;
    let retention = RetentionSummary {
        enabled: policy.enabled,
        dry_run: policy.dry_run,
        retain_months: policy.retain_months,
        cutoff: compute_cutoff_with_months(Utc::now(), policy.retain_months),
        collections: policy.collections.clone(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthReport {
            healthy,
            database,
            retention,
        }),
    )
}

#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Not ready while a configured store is unreachable.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match probe_database(&state).await {
        Some(db) if !db.reachable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

/// Prometheus text exposition.
#[tracing::instrument(name = "health.metrics")]
pub async fn metrics() -> impl IntoResponse {
    #[cfg(feature = "prometheus")]
    {
        return match get_prometheus_handle() {
            Some(handle) => (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            ),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            ),
        };
    }
    #[cfg(not(feature = "prometheus"))]
    (
        StatusCode::NOT_FOUND,
        [("content-type", "text/plain")],
        "Prometheus metrics not enabled".to_string(),
    )
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use std::sync::Arc;

    use axum::{Router, body::Body};
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        db::{DbPool, tests::harness::create_test_db},
    };

    const RETENTION_TOML: &str = r#"
[retention]
retain_months = 3
dry_run = true
collections = ["scan_records"]
"#;

    async fn app_with_store() -> (Router, Arc<DbPool>) {
        let config = AppConfig::from_str(RETENTION_TOML).unwrap();
        let db = Arc::new(create_test_db().await);
        let state = AppState::from_db(config.clone(), db.clone());
        (crate::build_app(&config, state), db)
    }

    async fn app_without_store() -> Router {
        let config = AppConfig::default();
        let state = AppState::new(config.clone()).await.unwrap();
        crate::build_app(&config, state)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_reports_retention_policy_and_cutoff() {
        let (app, _db) = app_with_store().await;

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let retention = &body["retention"];
        assert_eq!(retention["enabled"], false);
        assert_eq!(retention["dryRun"], true);
        assert_eq!(retention["retainMonths"], 3);
        assert_eq!(retention["collections"], serde_json::json!(["scan_records"]));

        let cutoff: DateTime<Utc> =
            serde_json::from_value(retention["cutoff"].clone()).unwrap();
        assert_eq!(cutoff, compute_cutoff_with_months(Utc::now(), 3));
    }

    #[tokio::test]
    async fn test_reachable_store_is_healthy() {
        let (app, _db) = app_with_store().await;

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["database"]["reachable"], true);
        assert!(body["database"]["latencyMs"].is_u64());
        assert!(body["database"].get("error").is_none());

        let (ready, _) = get(&app, "/health/ready").await;
        assert_eq!(ready, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_closed_store_is_unhealthy_and_not_ready() {
        let (app, db) = app_with_store().await;
        db.close().await;

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["healthy"], false);
        assert_eq!(body["database"]["reachable"], false);
        assert!(body["database"]["error"].is_string());

        let (ready, _) = get(&app, "/health/ready").await;
        assert_eq!(ready, StatusCode::SERVICE_UNAVAILABLE);

        let (live, _) = get(&app, "/health/live").await;
        assert_eq!(live, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_without_store_reports_default_policy() {
        let app = app_without_store().await;

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert!(body.get("database").is_none());
        assert_eq!(body["retention"]["retainMonths"], 6);

        let (ready, _) = get(&app, "/health/ready").await;
        assert_eq!(ready, StatusCode::OK);
    }

    #[cfg(feature = "prometheus")]
    #[tokio::test]
    async fn test_metrics_before_recorder_install() {
        let app = app_without_store().await;

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
