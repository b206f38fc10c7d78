//! Batched deletion of expired records.
//!
//! Matching ids are fetched once, then deleted in fixed-size batches. Every
//! deletion in a batch is issued at once and the batch is awaited as a whole
//! before the next one starts, which bounds the number of in-flight deletes
//! to the batch size. A failed deletion aborts the purge; batches that already
//! completed stay deleted.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Collection, DbError, PurgeableRepo};

/// Default number of concurrent deletions per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of purging one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResult {
    pub collection: Collection,
    /// Records actually removed (0 on a dry run)
    pub deleted: u64,
    /// Records that matched the cutoff
    pub total: u64,
    pub batches: usize,
}

impl PurgeResult {
    pub fn empty(collection: Collection) -> Self {
        Self {
            collection,
            deleted: 0,
            total: 0,
            batches: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("Failed to query expired records in {collection}: {source}")]
    Query {
        collection: Collection,
        source: DbError,
    },

    #[error("Failed to delete record {id} from {collection}: {source}")]
    Delete {
        collection: Collection,
        id: Uuid,
        source: DbError,
    },
}

impl PurgeError {
    pub fn collection(&self) -> Collection {
        match self {
            PurgeError::Query { collection, .. } | PurgeError::Delete { collection, .. } => {
                *collection
            }
        }
    }
}

/// Deletes records older than a cutoff, batch by batch.
#[derive(Debug, Clone)]
pub struct BatchPurger {
    batch_size: usize,
    dry_run: bool,
}

impl Default for BatchPurger {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchPurger {
    /// A batch size of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            dry_run: false,
        }
    }

    /// In dry-run mode matching records are counted and logged but not deleted.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Remove every record in `collection` whose `created_at` is strictly
    /// before `cutoff`.
    pub async fn purge(
        &self,
        collection: Collection,
        repo: &dyn PurgeableRepo,
        cutoff: DateTime<Utc>,
    ) -> Result<PurgeResult, PurgeError> {
        tracing::info!(
            collection = %collection,
            cutoff = %cutoff,
            dry_run = self.dry_run,
            "Purging expired records"
        );

        let ids = repo
            .list_ids_created_before(cutoff)
            .await
            .map_err(|source| PurgeError::Query { collection, source })?;

        let total = ids.len() as u64;
        tracing::info!(collection = %collection, total, "Found expired records");

        if self.dry_run {
            tracing::info!(
                collection = %collection,
                cutoff = %cutoff,
                total,
                "DRY RUN: Would delete {} records",
                total
            );
            return Ok(PurgeResult {
                total,
                ..PurgeResult::empty(collection)
            });
        }

        let mut deleted = 0u64;
        let mut batches = 0usize;

        for batch in ids.chunks(self.batch_size) {
            let outcomes = try_join_all(batch.iter().map(|&id| async move {
                repo.delete_by_id(id).await.map_err(|source| {
                    tracing::error!(
                        collection = %collection,
                        record_id = %id,
                        error = %source,
                        "Failed to delete expired record"
                    );
                    PurgeError::Delete {
                        collection,
                        id,
                        source,
                    }
                })
            }))
            .await?;

            // A record removed concurrently by someone else reports false
            deleted += outcomes.iter().filter(|removed| **removed).count() as u64;
            batches += 1;

            tracing::debug!(
                collection = %collection,
                deleted,
                total,
                "Deleted {}/{} records",
                deleted,
                total
            );
        }

        Ok(PurgeResult {
            collection,
            deleted,
            total,
            batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::db::DbResult;

    /// In-memory repo that tracks how many deletions run at once.
    struct MockRepo {
        ids: Mutex<Vec<Uuid>>,
        fail_on: Option<Uuid>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl MockRepo {
        fn with_records(n: usize) -> Self {
            Self {
                ids: Mutex::new((0..n).map(|_| Uuid::new_v4()).collect()),
                fail_on: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
            }
        }

        fn remaining(&self) -> usize {
            self.ids.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PurgeableRepo for MockRepo {
        async fn list_ids_created_before(&self, _cutoff: DateTime<Utc>) -> DbResult<Vec<Uuid>> {
            Ok(self.ids.lock().unwrap().clone())
        }

        async fn delete_by_id(&self, id: Uuid) -> DbResult<bool> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::task::yield_now().await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if Some(id) == self.fail_on {
                return Err(DbError::Internal("disk full".into()));
            }
            let mut ids = self.ids.lock().unwrap();
            let before = ids.len();
            ids.retain(|existing| *existing != id);
            Ok(ids.len() < before)
        }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_purge_250_records_in_three_batches() {
        let repo = MockRepo::with_records(250);
        let result = BatchPurger::new(100)
            .purge(Collection::DeliveryStats, &repo, cutoff())
            .await
            .unwrap();

        assert_eq!(result.total, 250);
        assert_eq!(result.deleted, 250);
        assert_eq!(result.batches, 3);
        assert_eq!(repo.remaining(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_deletions_bounded_by_batch_size() {
        let repo = MockRepo::with_records(250);
        BatchPurger::new(100)
            .purge(Collection::ScanRecords, &repo, cutoff())
            .await
            .unwrap();

        let max = repo.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 100, "max in flight was {max}");
        assert!(max > 1, "deletions within a batch should overlap");
    }

    #[tokio::test]
    async fn test_empty_match_set() {
        let repo = MockRepo::with_records(0);
        let result = BatchPurger::default()
            .purge(Collection::ScanRecords, &repo, cutoff())
            .await
            .unwrap();

        assert_eq!(result, PurgeResult::empty(Collection::ScanRecords));
        assert_eq!(repo.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_aborts_purge() {
        let mut repo = MockRepo::with_records(250);
        let original = repo.ids.lock().unwrap().clone();
        // Third record of the second batch
        let failing = original[102];
        repo.fail_on = Some(failing);

        let err = BatchPurger::new(100)
            .purge(Collection::DeliveryStats, &repo, cutoff())
            .await
            .unwrap_err();

        match &err {
            PurgeError::Delete { collection, id, .. } => {
                assert_eq!(*collection, Collection::DeliveryStats);
                assert_eq!(*id, failing);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.collection(), Collection::DeliveryStats);

        // First batch is gone and never rolled back; the third never started
        let remaining: HashSet<_> = repo.ids.lock().unwrap().iter().copied().collect();
        assert!(remaining.contains(&failing));
        assert!(original[..100].iter().all(|id| !remaining.contains(id)));
        assert!(original[200..].iter().all(|id| remaining.contains(id)));
        assert!(repo.delete_calls.load(Ordering::SeqCst) <= 200);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let repo = MockRepo::with_records(42);
        let result = BatchPurger::new(10)
            .with_dry_run(true)
            .purge(Collection::ScanRecords, &repo, cutoff())
            .await
            .unwrap();

        assert_eq!(result.total, 42);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.batches, 0);
        assert_eq!(repo.remaining(), 42);
    }

    #[test]
    fn test_zero_batch_size_clamped() {
        assert_eq!(BatchPurger::new(0).batch_size(), 1);
    }

    #[test]
    fn test_purge_result_serializes_camel_case() {
        let json = serde_json::to_value(PurgeResult {
            collection: Collection::DeliveryStats,
            deleted: 5,
            total: 7,
            batches: 1,
        })
        .unwrap();
        assert_eq!(json["collection"], "delivery_stats");
        assert_eq!(json["deleted"], 5);
        assert_eq!(json["total"], 7);
    }
}
