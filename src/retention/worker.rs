//! Retention worker for purging expired delivery data.
//!
//! A pass computes the cutoff, purges each configured collection in order,
//! logs a summary and publishes a `CleanupCompleted` event. The same pass
//! backs the background loop, the `cleanup` CLI command and the
//! `cleanupData` function.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{
    cutoff::compute_cutoff_with_months,
    purger::{BatchPurger, PurgeError, PurgeResult},
};
use crate::{
    config::RetentionConfig,
    db::{Collection, DbPool},
    events::{EventBus, ServerEvent},
    observability::metrics,
};

/// Results from a single retention pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub cutoff: DateTime<Utc>,
    pub results: Vec<PurgeResult>,
    pub execution_time_ms: u64,
    pub dry_run: bool,
}

impl CleanupReport {
    /// Records removed across all collections.
    pub fn total_deleted(&self) -> u64 {
        self.results.iter().map(|r| r.deleted).sum()
    }

    pub fn has_deletions(&self) -> bool {
        self.total_deleted() > 0
    }

    /// Result for one collection; an all-zero result if it was not purged.
    pub fn result_for(&self, collection: Collection) -> PurgeResult {
        self.results
            .iter()
            .find(|r| r.collection == collection)
            .cloned()
            .unwrap_or_else(|| PurgeResult::empty(collection))
    }
}

/// Runs retention passes against the database.
pub struct RetentionRunner {
    db: Arc<DbPool>,
    config: RetentionConfig,
    purger: BatchPurger,
    event_bus: Option<Arc<EventBus>>,
}

impl RetentionRunner {
    pub fn new(db: Arc<DbPool>, config: RetentionConfig) -> Self {
        let purger = BatchPurger::new(config.batch_size).with_dry_run(config.dry_run);
        Self {
            db,
            config,
            purger,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Run one pass with the current time.
    pub async fn run_once(&self) -> Result<CleanupReport, PurgeError> {
        self.run_at(Utc::now()).await
    }

    /// Run one pass as if the current time were `now`.
    ///
    /// Collections are purged sequentially; the first failure stops the pass
    /// and later collections are not touched.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CleanupReport, PurgeError> {
        let started = Instant::now();
        let cutoff = compute_cutoff_with_months(now, self.config.retain_months);

        tracing::info!(
            cutoff = %cutoff,
            retain_months = self.config.retain_months,
            dry_run = self.config.dry_run,
            "Starting retention pass"
        );

        let mut results = Vec::with_capacity(self.config.collections.len());
        for &collection in &self.config.collections {
            let repo = self.db.purgeable(collection);
            match self.purger.purge(collection, repo.as_ref(), cutoff).await {
                Ok(result) => {
                    if result.deleted > 0 {
                        metrics::record_retention_deletion(collection.as_str(), result.deleted);
                    }
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!(
                        collection = %collection,
                        cutoff = %cutoff,
                        error = %e,
                        "Retention pass failed"
                    );
                    metrics::record_retention_error(collection.as_str());
                    return Err(e);
                }
            }
        }

        let elapsed = started.elapsed();
        metrics::record_retention_run(elapsed.as_secs_f64());

        let report = CleanupReport {
            cutoff,
            results,
            execution_time_ms: elapsed.as_millis() as u64,
            dry_run: self.config.dry_run,
        };
        log_summary(&report);

        if let Some(bus) = &self.event_bus {
            bus.publish(ServerEvent::CleanupCompleted {
                timestamp: Utc::now(),
                cutoff,
                deleted: report.total_deleted(),
                dry_run: report.dry_run,
            });
        }

        Ok(report)
    }
}

fn log_summary(report: &CleanupReport) {
    for result in &report.results {
        tracing::info!(
            collection = %result.collection,
            deleted = result.deleted,
            total = result.total,
            batches = result.batches,
            "Collection purged"
        );
    }
    tracing::info!(
        cutoff = %report.cutoff,
        total_deleted = report.total_deleted(),
        execution_time_ms = report.execution_time_ms,
        dry_run = report.dry_run,
        "Retention pass complete"
    );
}

/// Starts the retention loop.
///
/// Runs a pass immediately, then every `interval_hours`, until `shutdown` is
/// cancelled. Failed passes are logged and retried at the next interval.
pub async fn start_retention_worker(runner: Arc<RetentionRunner>, shutdown: CancellationToken) {
    if !runner.config.enabled {
        tracing::info!("Retention worker disabled by configuration");
        return;
    }

    let interval = runner.config.interval();
    tracing::info!(
        interval_hours = runner.config.interval_hours,
        retain_months = runner.config.retain_months,
        batch_size = runner.config.batch_size,
        dry_run = runner.config.dry_run,
        "Starting retention worker"
    );

    loop {
        // Errors are already logged with context inside the pass
        let _ = runner.run_once().await;

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Retention worker stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
