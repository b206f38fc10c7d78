mod error;
pub mod functions;
pub mod health;
pub mod scans;

use axum::{
    Router,
    routing::{get, post},
};
pub use error::FunctionError;

use crate::AppState;

/// Function endpoints and the scan write path, all under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/functions/getDeliveryStats",
            post(functions::get_delivery_stats),
        )
        .route("/functions/cleanupData", post(functions::cleanup_data))
        .route("/functions/fixUsernames", post(functions::fix_usernames))
        .route("/scans", post(scans::record_scan))
}

/// Probes and the Prometheus endpoint.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
}
