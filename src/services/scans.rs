use std::sync::Arc;

use chrono::Utc;

use crate::{
    db::{DbResult, ScanRecordRepo},
    events::{EventBus, ServerEvent},
    models::{CreateScanRecord, ScanReceipt},
    observability::metrics,
};

/// Write path for parcel scans.
#[derive(Clone)]
pub struct ScanService {
    scans: Arc<dyn ScanRecordRepo>,
    event_bus: Option<Arc<EventBus>>,
}

impl ScanService {
    pub fn new(scans: Arc<dyn ScanRecordRepo>) -> Self {
        Self {
            scans,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Store a scan stamped now and bump the operator's count for today (UTC).
    pub async fn record_scan(
        &self,
        operator: &str,
        payload: serde_json::Value,
    ) -> DbResult<ScanReceipt> {
        let input = CreateScanRecord {
            operator_id: operator.to_string(),
            payload,
        };

        let receipt = self.scans.create(input, Utc::now()).await.inspect_err(|e| {
            tracing::error!(operator, error = %e, "Failed to record scan");
        })?;

        tracing::debug!(
            operator,
            scan_id = %receipt.scan.id,
            date = %receipt.date,
            delivery_count = receipt.delivery_count,
            "Scan recorded"
        );
        metrics::record_scan();

        if let Some(bus) = &self.event_bus {
            bus.publish(ServerEvent::ScanRecorded {
                timestamp: receipt.scan.created_at,
                scan_id: receipt.scan.id,
                operator_id: receipt.scan.operator_id.clone(),
                date: receipt.date,
                delivery_count: receipt.delivery_count,
            });
        }

        Ok(receipt)
    }
}
