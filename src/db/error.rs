use chrono::NaiveDate;
use thiserror::Error;

/// Store errors. Write-path rejections carry the operator or record they
/// concern so callers can log them with context.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not configured")]
    NotConfigured,

    #[error("Scan rejected: operator id is blank")]
    BlankOperator,

    #[error("Cannot add {count} deliveries for operator '{operator_id}' on {date}: count must be non-negative")]
    NegativeDeliveryCount {
        operator_id: String,
        date: NaiveDate,
        count: i64,
    },

    #[error("User with openid '{openid}' already exists")]
    DuplicateOpenid { openid: String },

    #[cfg(feature = "database-sqlite")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[cfg(feature = "database-sqlite")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Errors caused by the caller's input rather than the store.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            DbError::BlankOperator | DbError::NegativeDeliveryCount { .. }
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;
