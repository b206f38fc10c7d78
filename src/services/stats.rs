use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};

use crate::{
    db::{DateRange, DbResult, DeliveryStatsRepo},
    models::{DailyCount, MonthCount, Report, ReportMode, StatsBundle},
    observability::metrics,
};

/// Read-only delivery statistics for one operator at a time.
///
/// Every read fails soft: a store error is logged and replaced by the
/// query's zero value, so the statistics page renders even when a single
/// query breaks.
#[derive(Clone)]
pub struct StatsService {
    stats: Arc<dyn DeliveryStatsRepo>,
}

impl StatsService {
    pub fn new(stats: Arc<dyn DeliveryStatsRepo>) -> Self {
        Self { stats }
    }

    /// Deliveries on exactly `date`. A missing record and a failed read both
    /// give 0.
    pub async fn daily_count(&self, date: NaiveDate, operator: &str) -> i64 {
        let result = self
            .stats
            .get_for_day(operator, date)
            .await
            .map(|record| record.map_or(0, |r| r.delivery_count));
        soft("daily_count", operator, result, || 0)
    }

    /// Deliveries between `month_start` and `end`, both inclusive, with the
    /// per-day breakdown.
    pub async fn month_count(
        &self,
        month_start: NaiveDate,
        end: NaiveDate,
        operator: &str,
    ) -> MonthCount {
        let result = self
            .stats
            .list_in_range(
                operator,
                DateRange {
                    start: month_start,
                    end,
                },
            )
            .await
            .map(|records| {
                let daily_details: Vec<DailyCount> = records.iter().map(DailyCount::from).collect();
                MonthCount {
                    month: month_start.format("%Y-%m").to_string(),
                    total: daily_details.iter().map(|d| d.delivery_count).sum(),
                    daily_details,
                }
            });
        soft("month_count", operator, result, || MonthCount::empty(month_start))
    }

    /// All-time deliveries.
    pub async fn total_count(&self, operator: &str) -> i64 {
        let result = self.stats.total_for_operator(operator).await;
        soft("total_count", operator, result, || 0)
    }

    /// One entry per day from `today - 6` through `today`, oldest first.
    /// Days without a record count as 0. A failed read, or a window reaching
    /// before the earliest representable date, gives an empty list.
    pub async fn seven_day_count(&self, operator: &str, today: NaiveDate) -> Vec<DailyCount> {
        let Some(dates) = (0..7)
            .rev()
            .map(|back| today.checked_sub_days(Days::new(back)))
            .collect::<Option<Vec<NaiveDate>>>()
        else {
            tracing::warn!(operator, %today, "Seven-day window out of date range");
            return Vec::new();
        };

        let result = self.stats.list_for_dates(operator, &dates).await.map(|records| {
            dates
                .iter()
                .map(|&date| DailyCount {
                    date,
                    delivery_count: records
                        .iter()
                        .find(|r| r.date == date)
                        .map_or(0, |r| r.delivery_count),
                })
                .collect()
        });
        soft("seven_day_count", operator, result, Vec::new)
    }

    /// Records for a single day, or for the month of `date` up to and
    /// including `date`.
    pub async fn report(&self, operator: &str, mode: ReportMode, date: NaiveDate) -> Report {
        let start_date = match mode {
            ReportMode::Day => date,
            ReportMode::Month => first_of_month(date),
        };
        let range = DateRange {
            start: start_date,
            end: date,
        };

        let records = soft(
            "report",
            operator,
            self.stats
                .list_in_range(operator, range)
                .await
                .map(|records| records.iter().map(DailyCount::from).collect::<Vec<_>>()),
            Vec::new,
        );

        Report {
            mode,
            start_date,
            end_date: date,
            total: records.iter().map(|r| r.delivery_count).sum(),
            records,
        }
    }

    /// Everything the statistics page shows, relative to `today`.
    pub async fn stats_bundle(&self, operator: &str, today: NaiveDate) -> StatsBundle {
        let today_count = self.daily_count(today, operator).await;
        let month_count = self.month_count(first_of_month(today), today, operator).await;
        let total_count = self.total_count(operator).await;
        let daily_stats = self.seven_day_count(operator, today).await;

        StatsBundle {
            today_count,
            month_count,
            total_count,
            daily_stats,
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Unwrap a read, logging and counting the failure before substituting the
/// default.
fn soft<T>(
    query: &'static str,
    operator: &str,
    result: DbResult<T>,
    default: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(query, operator, error = %e, "Statistics read failed, using default");
            metrics::record_soft_read_failure(query);
            default()
        }
    }
}
