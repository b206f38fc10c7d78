mod error;
pub mod repos;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(all(test, feature = "database-sqlite"))]
pub mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    delivery_stats: Arc<dyn DeliveryStatsRepo>,
    scan_records: Arc<dyn ScanRecordRepo>,
    users: Arc<dyn UserRepo>,
    // Same concrete repos as above, viewed through the purge interface
    purge_delivery_stats: Arc<dyn PurgeableRepo>,
    purge_scan_records: Arc<dyn PurgeableRepo>,
}

#[cfg(feature = "database-sqlite")]
impl CachedRepos {
    fn sqlite(pool: &sqlx::SqlitePool) -> Self {
        let delivery_stats = Arc::new(sqlite::SqliteDeliveryStatsRepo::new(pool.clone()));
        let scan_records = Arc::new(sqlite::SqliteScanRecordRepo::new(pool.clone()));
        Self {
            delivery_stats: delivery_stats.clone(),
            scan_records: scan_records.clone(),
            users: Arc::new(sqlite::SqliteUserRepo::new(pool.clone())),
            purge_delivery_stats: delivery_stats,
            purge_scan_records: scan_records,
        }
    }
}

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(not(feature = "database-sqlite"))]
    _None(std::convert::Infallible),
}

/// Database handle owning the connection pool and the repositories built on it.
///
/// Constructed once by the process entry point and passed into services
/// explicitly. Repositories are cached at construction time to avoid
/// allocation on each access.
pub struct DbPool {
    inner: PoolStorage,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        DbPool {
            repos: CachedRepos::sqlite(&pool),
            inner: PoolStorage::Sqlite(pool),
        }
    }

    /// Create a database pool from configuration
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::None => Err(DbError::NotConfigured),
            #[cfg(feature = "database-sqlite")]
            DatabaseConfig::Sqlite(cfg) => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        sqlx::sqlite::SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .journal_mode(if cfg.wal_mode {
                                sqlx::sqlite::SqliteJournalMode::Wal
                            } else {
                                sqlx::sqlite::SqliteJournalMode::Delete
                            })
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                let db = Self::from_sqlite(pool);
                if cfg.run_migrations {
                    db.run_migrations().await?;
                }
                Ok(db)
            }
            #[cfg(not(feature = "database-sqlite"))]
            DatabaseConfig::Sqlite(_) => Err(DbError::NotConfigured),
        }
    }

    /// Run database migrations using sqlx's migration runner.
    /// This automatically creates and manages a _sqlx_migrations table.
    pub async fn run_migrations(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                tracing::info!("Running SQLite migrations");
                sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
                tracing::info!("SQLite migrations completed successfully");
                Ok(())
            }
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Get delivery stats repository
    pub fn delivery_stats(&self) -> Arc<dyn DeliveryStatsRepo> {
        Arc::clone(&self.repos.delivery_stats)
    }

    /// Get scan record repository
    pub fn scan_records(&self) -> Arc<dyn ScanRecordRepo> {
        Arc::clone(&self.repos.scan_records)
    }

    /// Get user repository
    pub fn users(&self) -> Arc<dyn UserRepo> {
        Arc::clone(&self.repos.users)
    }

    /// Get the purge view of a retention-managed collection
    pub fn purgeable(&self, collection: Collection) -> Arc<dyn PurgeableRepo> {
        match collection {
            Collection::DeliveryStats => Arc::clone(&self.repos.purge_delivery_stats),
            Collection::ScanRecords => Arc::clone(&self.repos.purge_scan_records),
        }
    }

    /// Current time according to the database server.
    ///
    /// Used as the reference "today" for statistics so every client agrees on
    /// the date regardless of its own clock.
    pub async fn server_time(&self) -> DbResult<DateTime<Utc>> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                let raw: String = sqlx::query_scalar("SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')")
                    .fetch_one(pool)
                    .await?;
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| DbError::Internal(format!("Invalid server time '{raw}': {e}")))
            }
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Health check for database connectivity
    pub async fn health_check(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => pool.close().await,
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }
}
