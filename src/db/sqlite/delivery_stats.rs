use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::common::{STAT_COLUMNS, parse_uuid, placeholders, stat_from_row};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{DateRange, DeliveryStatsRepo, PurgeableRepo},
    },
    models::DeliveryStatRecord,
};

pub struct SqliteDeliveryStatsRepo {
    pool: SqlitePool,
}

impl SqliteDeliveryStatsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Insert-or-increment the `(operator, date)` counter.
///
/// Shared with the scan repo so a scan and its tally can commit in one
/// transaction.
pub(super) async fn upsert_delivery_count<'e, E>(
    executor: E,
    operator_id: &str,
    date: NaiveDate,
    count: i64,
    at: DateTime<Utc>,
) -> DbResult<DeliveryStatRecord>
where
    E: SqliteExecutor<'e>,
{
    if count < 0 {
        return Err(DbError::NegativeDeliveryCount {
            operator_id: operator_id.to_string(),
            date,
            count,
        });
    }

    let query = format!(
        r#"
        INSERT INTO delivery_stats (id, operator_id, date, delivery_count, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (operator_id, date)
        DO UPDATE SET delivery_count = delivery_count + excluded.delivery_count
        RETURNING {STAT_COLUMNS}
        "#
    );

    let row = sqlx::query(&query)
        .bind(Uuid::new_v4().to_string())
        .bind(operator_id)
        .bind(date)
        .bind(count)
        .bind(at)
        .fetch_one(executor)
        .await?;

    stat_from_row(&row)
}

#[async_trait]
impl PurgeableRepo for SqliteDeliveryStatsRepo {
    async fn list_ids_created_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM delivery_stats WHERE created_at < ?")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| parse_uuid(&row.get::<String, _>("id")))
            .collect()
    }

    async fn delete_by_id(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM delivery_stats WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DeliveryStatsRepo for SqliteDeliveryStatsRepo {
    async fn record_deliveries(
        &self,
        operator_id: &str,
        date: NaiveDate,
        count: i64,
        at: DateTime<Utc>,
    ) -> DbResult<DeliveryStatRecord> {
        upsert_delivery_count(&self.pool, operator_id, date, count, at).await
    }

    async fn get_for_day(
        &self,
        operator_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<DeliveryStatRecord>> {
        let query = format!(
            "SELECT {STAT_COLUMNS} FROM delivery_stats WHERE operator_id = ? AND date = ? LIMIT 1"
        );

        let row = sqlx::query(&query)
            .bind(operator_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(stat_from_row).transpose()
    }

    async fn list_in_range(
        &self,
        operator_id: &str,
        range: DateRange,
    ) -> DbResult<Vec<DeliveryStatRecord>> {
        let query = format!(
            r#"
            SELECT {STAT_COLUMNS}
            FROM delivery_stats
            WHERE operator_id = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#
        );

        let rows = sqlx::query(&query)
            .bind(operator_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(stat_from_row).collect()
    }

    async fn list_for_dates(
        &self,
        operator_id: &str,
        dates: &[NaiveDate],
    ) -> DbResult<Vec<DeliveryStatRecord>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {STAT_COLUMNS}
            FROM delivery_stats
            WHERE operator_id = ? AND date IN ({})
            ORDER BY date ASC
            "#,
            placeholders(dates.len())
        );

        let mut q = sqlx::query(&query).bind(operator_id);
        for date in dates {
            q = q.bind(*date);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(stat_from_row).collect()
    }

    async fn total_for_operator(&self, operator_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delivery_count), 0) FROM delivery_stats WHERE operator_id = ?",
        )
        .bind(operator_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
