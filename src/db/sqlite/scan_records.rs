use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{common::parse_uuid, delivery_stats::upsert_delivery_count};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{PurgeableRepo, ScanRecordRepo},
    },
    models::{CreateScanRecord, ScanReceipt, ScanRecord},
};

pub struct SqliteScanRecordRepo {
    pool: SqlitePool,
}

impl SqliteScanRecordRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurgeableRepo for SqliteScanRecordRepo {
    async fn list_ids_created_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM scan_records WHERE created_at < ?")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| parse_uuid(&row.get::<String, _>("id")))
            .collect()
    }

    async fn delete_by_id(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM scan_records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScanRecordRepo for SqliteScanRecordRepo {
    async fn create(&self, input: CreateScanRecord, at: DateTime<Utc>) -> DbResult<ScanReceipt> {
        if input.operator_id.trim().is_empty() {
            return Err(DbError::BlankOperator);
        }

        let id = Uuid::new_v4();
        let payload = serde_json::to_string(&input.payload)?;
        let date = at.date_naive();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO scan_records (id, operator_id, payload, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.operator_id)
        .bind(&payload)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let stat = upsert_delivery_count(&mut *tx, &input.operator_id, date, 1, at).await?;

        tx.commit().await?;

        Ok(ScanReceipt {
            scan: ScanRecord {
                id,
                operator_id: input.operator_id,
                payload: input.payload,
                created_at: at,
            },
            date,
            delivery_count: stat.delivery_count,
        })
    }
}
