use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{DateRange, PurgeableRepo};
use crate::{db::error::DbResult, models::DeliveryStatRecord};

#[async_trait]
pub trait DeliveryStatsRepo: PurgeableRepo {
    /// Add `count` deliveries to the operator's counter for `date`, creating
    /// the record (stamped `at`) if it does not exist yet.
    async fn record_deliveries(
        &self,
        operator_id: &str,
        date: NaiveDate,
        count: i64,
        at: DateTime<Utc>,
    ) -> DbResult<DeliveryStatRecord>;

    /// The record for exactly this `(operator, date)`, if any.
    async fn get_for_day(
        &self,
        operator_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<DeliveryStatRecord>>;

    /// Records for the operator whose date falls inside `range` (inclusive),
    /// oldest first.
    async fn list_in_range(
        &self,
        operator_id: &str,
        range: DateRange,
    ) -> DbResult<Vec<DeliveryStatRecord>>;

    /// Records for the operator whose date is one of `dates`, oldest first.
    async fn list_for_dates(
        &self,
        operator_id: &str,
        dates: &[NaiveDate],
    ) -> DbResult<Vec<DeliveryStatRecord>>;

    /// Sum of `delivery_count` over every record the operator has.
    async fn total_for_operator(&self, operator_id: &str) -> DbResult<i64>;
}
