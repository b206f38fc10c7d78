use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PurgeableRepo;
use crate::{
    db::error::DbResult,
    models::{CreateScanRecord, ScanReceipt},
};

#[async_trait]
pub trait ScanRecordRepo: PurgeableRepo {
    /// Store a scan stamped `at` and increment the operator's delivery counter
    /// for `at`'s UTC date. Both writes commit together or not at all.
    async fn create(&self, input: CreateScanRecord, at: DateTime<Utc>) -> DbResult<ScanReceipt>;
}
