use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::DbError;

/// Errors from the function endpoints.
///
/// Rendered as `{"success": false, "error": <code>, "message": <text>}`.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("Either userId or operator must be provided")]
    MissingOperator,

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("This operation requires a database")]
    DatabaseRequired,

    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for FunctionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotConfigured => FunctionError::DatabaseRequired,
            err if err.is_rejected_input() => FunctionError::InvalidRequest(err.to_string()),
            err => FunctionError::Database(err),
        }
    }
}

impl FunctionError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            FunctionError::MissingOperator => (StatusCode::BAD_REQUEST, "missing_operator"),
            FunctionError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            FunctionError::DatabaseRequired => {
                (StatusCode::SERVICE_UNAVAILABLE, "database_required")
            }
            FunctionError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        }
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            FunctionError::Database(e) => {
                tracing::error!(error = %e, "Database error in function handler");
                "An internal database error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "success": false,
                "error": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

/// Successful envelope: `{"success": true, "data": ...}`.
pub fn success<T: serde::Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}
