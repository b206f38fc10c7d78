use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One operator's delivery counter for a single calendar day.
///
/// There is at most one record per `(operator_id, date)`; the scan recorder
/// increments `delivery_count` in place rather than inserting duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatRecord {
    pub id: Uuid,
    /// Opaque operator/account key that scopes every stats query
    pub operator_id: String,
    pub date: NaiveDate,
    pub delivery_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A `(date, count)` pair as returned to clients.
///
/// Dates serialize as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub delivery_count: i64,
}

impl From<&DeliveryStatRecord> for DailyCount {
    fn from(record: &DeliveryStatRecord) -> Self {
        Self {
            date: record.date,
            delivery_count: record.delivery_count,
        }
    }
}

/// Month-to-date rollup for one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub total: i64,
    pub daily_details: Vec<DailyCount>,
}

impl MonthCount {
    /// The zero value returned when the month could not be read.
    pub fn empty(month_start: NaiveDate) -> Self {
        Self {
            month: month_start.format("%Y-%m").to_string(),
            total: 0,
            daily_details: Vec::new(),
        }
    }
}

/// Granularity of a report request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// A single calendar day
    #[default]
    Day,
    /// From the first of the month through the requested date
    Month,
}

/// Per-day records for a report window plus their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: ReportMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total: i64,
    pub records: Vec<DailyCount>,
}

/// Everything the statistics page shows for one operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsBundle {
    pub today_count: i64,
    pub month_count: MonthCount,
    pub total_count: i64,
    pub daily_stats: Vec<DailyCount>,
}
