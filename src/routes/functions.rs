//! Function endpoints used by the delivery app.
//!
//! Each endpoint takes a JSON body and answers with a `success` envelope.
//! `getDeliveryStats` multiplexes several reads on its `type` field.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;

use super::error::{FunctionError, success};
use crate::{AppState, db::Collection, models::ReportMode, services::Services};

/// Body of `getDeliveryStats`. Every field is optional; an empty body asks
/// for the stats bundle and then fails for want of an operator.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatsRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Reference day, overriding the server's "today"
    pub date: Option<NaiveDate>,
    pub operator: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub mode: ReportMode,
}

impl DeliveryStatsRequest {
    pub fn operator(&self) -> Result<&str, FunctionError> {
        resolve_operator(self.user_id.as_deref(), self.operator.as_deref())
    }
}

/// Operator identity of a request: `userId` wins over `operator`, and blank
/// values count as missing.
pub(super) fn resolve_operator<'a>(
    user_id: Option<&'a str>,
    operator: Option<&'a str>,
) -> Result<&'a str, FunctionError> {
    [user_id, operator]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .ok_or(FunctionError::MissingOperator)
}

pub(super) fn parse_body<T>(body: &Bytes) -> Result<T, FunctionError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| FunctionError::InvalidRequest(e.to_string()))
}

pub(super) fn services(state: &AppState) -> Result<&Services, FunctionError> {
    state.services.as_ref().ok_or(FunctionError::DatabaseRequired)
}

/// `POST /api/functions/getDeliveryStats`
#[tracing::instrument(name = "functions.get_delivery_stats", skip(state, body))]
pub async fn get_delivery_stats(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, FunctionError> {
    let request: DeliveryStatsRequest = parse_body(&body)?;

    match request.kind.as_deref() {
        Some("getServerTime") => Ok(server_time(&state).await),
        Some("getReport") => {
            let stats = &services(&state)?.stats;
            let operator = request.operator()?;
            let date = match request.date {
                Some(date) => date,
                None => today(&state).await,
            };
            let report = stats.report(operator, request.mode, date).await;
            Ok(success(report).into_response())
        }
        _ => {
            let stats = &services(&state)?.stats;
            let operator = request.operator()?;
            let today = match request.date {
                Some(date) => date,
                None => today(&state).await,
            };
            tracing::debug!(operator, %today, "Building statistics bundle");
            let bundle = stats.stats_bundle(operator, today).await;
            Ok(success(bundle).into_response())
        }
    }
}

async fn server_time(state: &AppState) -> Response {
    let Some(db) = &state.db else {
        return FunctionError::DatabaseRequired.into_response();
    };
    match db.server_time().await {
        Ok(now) => success(json!({ "serverTime": now.timestamp_millis() })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read server time");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// The database's current UTC date, or the local clock if it can't be read.
async fn today(state: &AppState) -> NaiveDate {
    if let Some(db) = &state.db {
        match db.server_time().await {
            Ok(now) => return now.date_naive(),
            Err(e) => {
                tracing::warn!(error = %e, "Server time unavailable, using local clock");
            }
        }
    }
    Utc::now().date_naive()
}

/// `POST /api/functions/cleanupData`
///
/// Runs one retention pass immediately, regardless of whether the periodic
/// worker is enabled.
#[tracing::instrument(name = "functions.cleanup_data", skip(state))]
pub async fn cleanup_data(State(state): State<AppState>) -> Result<Response, FunctionError> {
    let runner = &services(&state)?.retention;

    match runner.run_once().await {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "stats": report.result_for(Collection::DeliveryStats),
            "scans": report.result_for(Collection::ScanRecords),
            "cutoffDate": report.cutoff.to_rfc3339_opts(SecondsFormat::Millis, true),
            "executionTime": report.execution_time_ms,
            "dryRun": report.dry_run,
        }))
        .into_response()),
        Err(e) => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            })),
        )
            .into_response()),
    }
}

/// `POST /api/functions/fixUsernames`
#[tracing::instrument(name = "functions.fix_usernames", skip(state))]
pub async fn fix_usernames(State(state): State<AppState>) -> Result<Response, FunctionError> {
    let repair = &services(&state)?.repair;

    match repair.repair_usernames().await {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "message": report.message(),
            "successCount": report.success_count,
            "failureCount": report.failure_count,
            "results": report.results,
        }))
        .into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Username repair failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Failed to repair usernames",
                    "error": e.to_string(),
                })),
            )
                .into_response())
        }
    }
}


#[cfg(all(test, feature = "database-sqlite"))]
mod route_tests {
    use std::sync::Arc;

    use axum::{Router, body::Body};
    use chrono::{TimeZone, Utc};
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        db::{DbPool, tests::harness::create_test_db},
        models::CreateUser,
    };

    async fn test_app() -> (Router, Arc<DbPool>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let config = AppConfig::default();
        let db = Arc::new(create_test_db().await);
        let state = AppState::from_db(config.clone(), db.clone());
        (crate::build_app(&config, state), db)
    }

    async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn seed_stats(db: &DbPool) {
        let repo = db.delivery_stats();
        for (d, count) in [(1, 4), (14, 6), (15, 5)] {
            let date = NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
            let at = Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap());
            repo.record_deliveries("op-1", date, count, at).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_server_time() {
        let (app, _) = test_app().await;
        let before = Utc::now().timestamp_millis();

        let (status, body) = post_json(
            &app,
            "/api/functions/getDeliveryStats",
            r#"{"type":"getServerTime"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let server_time = body["data"]["serverTime"].as_i64().unwrap();
        assert!((server_time - before).abs() < 60_000);
    }

    #[tokio::test]
    async fn test_stats_bundle_for_date() {
        let (app, db) = test_app().await;
        seed_stats(&db).await;

        let (status, body) = post_json(
            &app,
            "/api/functions/getDeliveryStats",
            r#"{"operator":"op-1","date":"2024-03-15"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["todayCount"], 5);
        assert_eq!(data["monthCount"]["month"], "2024-03");
        assert_eq!(data["monthCount"]["total"], 15);
        assert_eq!(data["totalCount"], 15);
        assert_eq!(data["dailyStats"].as_array().unwrap().len(), 7);
        assert_eq!(data["dailyStats"][0]["date"], "2024-03-09");
    }

    #[tokio::test]
    async fn test_report_month_mode() {
        let (app, db) = test_app().await;
        seed_stats(&db).await;

        let (status, body) = post_json(
            &app,
            "/api/functions/getDeliveryStats",
            r#"{"type":"getReport","userId":"op-1","date":"2024-03-14","mode":"month"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["startDate"], "2024-03-01");
        assert_eq!(body["data"]["endDate"], "2024-03-14");
        assert_eq!(body["data"]["total"], 10);
    }

    #[tokio::test]
    async fn test_stats_bundle_for_earliest_dates_fails_soft() {
        let (app, _) = test_app().await;

        let (status, body) = post_json(
            &app,
            "/api/functions/getDeliveryStats",
            r#"{"operator":"op-1","date":"-262143-01-03"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["todayCount"], 0);
        assert!(body["data"]["dailyStats"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_operator_is_rejected() {
        let (app, _) = test_app().await;

        let (status, body) = post_json(&app, "/api/functions/getDeliveryStats", "{}").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_operator");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, _) = test_app().await;

        let (status, body) = post_json(&app, "/api/functions/getDeliveryStats", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_cleanup_data() {
        let (app, db) = test_app().await;
        let old = Utc::now() - chrono::Duration::days(400);
        db.delivery_stats()
            .record_deliveries("op-1", old.date_naive(), 3, old)
            .await
            .unwrap();

        let (status, body) = post_json(&app, "/api/functions/cleanupData", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["deleted"], 1);
        assert_eq!(body["stats"]["total"], 1);
        assert_eq!(body["scans"]["deleted"], 0);
        let cutoff = body["cutoffDate"].as_str().unwrap();
        assert!(cutoff.ends_with("-01T00:00:00.000Z"), "cutoff was {cutoff}");
        assert!(body["executionTime"].is_number());
    }

    #[tokio::test]
    async fn test_fix_usernames() {
        let (app, db) = test_app().await;
        for openid in ["oid-a", "oid-b"] {
            db.users()
                .create(CreateUser {
                    openid: openid.into(),
                    username: None,
                })
                .await
                .unwrap();
        }

        let (status, body) = post_json(&app, "/api/functions/fixUsernames", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["successCount"], 2);
        assert_eq!(body["failureCount"], 0);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);

        let (_, again) = post_json(&app, "/api/functions/fixUsernames", "").await;
        assert!(again["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_functions_without_database() {
        let config = AppConfig::default();
        let state = AppState::new(config.clone()).await.unwrap();
        let app = crate::build_app(&config, state);

        let (status, body) = post_json(&app, "/api/functions/cleanupData", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "database_required");
    }
}
