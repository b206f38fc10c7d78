mod delivery_stats;
mod scan_records;
mod users;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
pub use delivery_stats::*;
pub use scan_records::*;
use serde::{Deserialize, Serialize};
pub use users::*;
use uuid::Uuid;

use super::error::DbResult;

/// Date range for queries (both ends inclusive)
#[derive(Debug, Clone)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Collections whose records expire under the retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Per-operator daily counters
    DeliveryStats,
    /// Individual scan events
    ScanRecords,
}

impl Collection {
    /// Every retention-managed collection, in purge order.
    pub const ALL: [Collection; 2] = [Collection::DeliveryStats, Collection::ScanRecords];

    /// Table / collection name in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::DeliveryStats => "delivery_stats",
            Collection::ScanRecords => "scan_records",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery_stats" => Ok(Collection::DeliveryStats),
            "scan_records" => Ok(Collection::ScanRecords),
            other => Err(format!("unknown collection '{other}'")),
        }
    }
}

/// Record-level deletion interface used by the batch purger.
///
/// Purging is expressed as "list, then delete by id" rather than a single
/// bulk delete so the purger controls batching and concurrency.
#[async_trait]
pub trait PurgeableRepo: Send + Sync {
    /// IDs of all records whose `created_at` is strictly before `cutoff`.
    async fn list_ids_created_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Uuid>>;

    /// Delete one record. Returns `false` if no record had this id.
    async fn delete_by_id(&self, id: Uuid) -> DbResult<bool>;
}
