//! Shared tests for ScanRecordRepo implementations
//!
//! Scans touch two tables, so the context carries the stats repo too.

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

use crate::{
    db::{
        error::DbError,
        repos::{DeliveryStatsRepo, ScanRecordRepo},
    },
    models::CreateScanRecord,
};

pub struct ScanTestContext<'a> {
    pub scans: &'a dyn ScanRecordRepo,
    pub stats: &'a dyn DeliveryStatsRepo,
}

fn scan(operator_id: &str) -> CreateScanRecord {
    CreateScanRecord {
        operator_id: operator_id.to_string(),
        payload: json!({ "trackingNo": "SF1234567890" }),
    }
}

pub async fn test_create_scan_increments_daily_count(ctx: &ScanTestContext<'_>) {
    let at = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();

    let first = ctx.scans.create(scan("op-1"), at).await.unwrap();
    assert_eq!(first.delivery_count, 1);
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    assert_eq!(first.scan.payload["trackingNo"], "SF1234567890");

    let second = ctx
        .scans
        .create(scan("op-1"), at + chrono::Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(second.delivery_count, 2);
    assert_ne!(second.scan.id, first.scan.id);

    let record = ctx
        .stats
        .get_for_day("op-1", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        .await
        .unwrap()
        .expect("Stats record should exist after a scan");
    assert_eq!(record.delivery_count, 2);
}

pub async fn test_scans_on_different_days_use_separate_counters(ctx: &ScanTestContext<'_>) {
    let monday = Utc.with_ymd_and_hms(2024, 3, 11, 23, 59, 0).unwrap();
    let tuesday = Utc.with_ymd_and_hms(2024, 3, 12, 0, 1, 0).unwrap();

    ctx.scans.create(scan("op-1"), monday).await.unwrap();
    let receipt = ctx.scans.create(scan("op-1"), tuesday).await.unwrap();

    assert_eq!(receipt.delivery_count, 1);
    assert_eq!(ctx.stats.total_for_operator("op-1").await.unwrap(), 2);
}

pub async fn test_create_scan_rejects_blank_operator(ctx: &ScanTestContext<'_>) {
    let result = ctx.scans.create(scan("  "), Utc::now()).await;
    assert!(matches!(result, Err(DbError::BlankOperator)));
    assert_eq!(ctx.stats.total_for_operator("  ").await.unwrap(), 0);
}

pub async fn test_scan_purge_interface(ctx: &ScanTestContext<'_>) {
    let old_at = Utc.with_ymd_and_hms(2023, 1, 5, 12, 0, 0).unwrap();
    let new_at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
    let cutoff = Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0).unwrap();

    let old = ctx.scans.create(scan("op-1"), old_at).await.unwrap();
    ctx.scans.create(scan("op-1"), new_at).await.unwrap();

    let ids = ctx.scans.list_ids_created_before(cutoff).await.unwrap();
    assert_eq!(ids, vec![old.scan.id]);

    assert!(ctx.scans.delete_by_id(old.scan.id).await.unwrap());
    assert!(
        ctx.scans
            .list_ids_created_before(cutoff)
            .await
            .unwrap()
            .is_empty()
    );
}

// ============================================================================
// SQLite Tests
// ============================================================================

mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::{SqliteDeliveryStatsRepo, SqliteScanRecordRepo},
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repos() -> (SqliteScanRecordRepo, SqliteDeliveryStatsRepo) {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        (
            SqliteScanRecordRepo::new(pool.clone()),
            SqliteDeliveryStatsRepo::new(pool),
        )
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let (scans, stats) = create_repos().await;
                let ctx = ScanTestContext {
                    scans: &scans,
                    stats: &stats,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_create_scan_increments_daily_count);
    sqlite_test!(test_scans_on_different_days_use_separate_counters);
    sqlite_test!(test_create_scan_rejects_blank_operator);
    sqlite_test!(test_scan_purge_interface);
}
