use std::time::Instant;

use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{AppState, observability::metrics};

/// Enforces the configured request timeout and records HTTP metrics.
///
/// Metrics are labelled with the matched route template rather than the raw
/// path so that unknown URLs don't create new series.
pub async fn request_metrics_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let timeout = state.config.server.timeout();
    let response = match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                method = %method,
                path = %path,
                timeout_secs = timeout.as_secs(),
                "Request timed out"
            );
            (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({
                    "success": false,
                    "error": "timeout",
                    "message": "Request timed out",
                })),
            )
                .into_response()
        }
    };

    let duration = start.elapsed();
    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        duration.as_secs_f64(),
    );

    response
}
