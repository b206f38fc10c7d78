use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{
    error::{FunctionError, success},
    functions::{parse_body, resolve_operator, services},
};
use crate::AppState;

/// Body of `POST /api/scans`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScanRequest {
    pub operator: Option<String>,
    pub user_id: Option<String>,
    /// Stored verbatim
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Record a scan and bump today's delivery count for its operator.
#[tracing::instrument(name = "scans.record", skip(state, body))]
pub async fn record_scan(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, FunctionError> {
    let RecordScanRequest {
        operator,
        user_id,
        payload,
    } = parse_body(&body)?;
    let scans = &services(&state)?.scans;
    let operator = resolve_operator(user_id.as_deref(), operator.as_deref())?;

    let receipt = scans.record_scan(operator, payload).await?;
    Ok((StatusCode::CREATED, success(receipt)).into_response())
}
