use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single parcel scan. The payload is stored as-is and never inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: Uuid,
    pub operator_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanRecord {
    pub operator_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Result of recording a scan: the stored scan plus the operator's updated
/// count for the scan's day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReceipt {
    pub scan: ScanRecord,
    pub date: NaiveDate,
    pub delivery_count: i64,
}
