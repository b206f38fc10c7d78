//! Delivery tracking backend: per-operator daily delivery statistics, scan
//! recording, data retention and username repair.

pub mod config;
pub mod db;
pub mod events;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod retention;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use tokio_util::task::TaskTracker;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    config::{AppConfig, DatabaseConfig},
    db::{DbPool, DbResult},
    events::EventBus,
    services::Services,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when no `[database]` section is configured
    pub db: Option<Arc<DbPool>>,
    pub services: Option<Services>,
    pub event_bus: Arc<EventBus>,
    /// Tracks background tasks so shutdown can wait for them
    pub task_tracker: TaskTracker,
}

impl AppState {
    /// Connect to the configured database (if any) and build the services.
    pub async fn new(config: AppConfig) -> DbResult<Self> {
        let db = match &config.database {
            DatabaseConfig::None => {
                tracing::warn!("No database configured; function endpoints will be unavailable");
                None
            }
            db_config => {
                let pool = DbPool::from_config(db_config).await?;
                tracing::info!("Database connected");
                Some(Arc::new(pool))
            }
        };

        Ok(Self::build(config, db))
    }

    /// State around an already-open database.
    pub fn from_db(config: AppConfig, db: Arc<DbPool>) -> Self {
        Self::build(config, Some(db))
    }

    fn build(config: AppConfig, db: Option<Arc<DbPool>>) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let services = db
            .as_ref()
            .map(|db| Services::new(db.clone(), config.retention.clone(), event_bus.clone()));

        Self {
            config: Arc::new(config),
            db,
            services,
            event_bus,
            task_tracker: TaskTracker::new(),
        }
    }
}

/// Assemble the HTTP application.
pub fn build_app(config: &AppConfig, state: AppState) -> Router {
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::health_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware));

    app.layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
