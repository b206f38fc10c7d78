use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{DbResult, UserRepo},
    events::{EventBus, ServerEvent},
    models::User,
    observability::metrics,
};

/// What happened to one user during a repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    pub user_id: Uuid,
    pub success: bool,
    /// Rows updated, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ledger of a repair run; one outcome per selected user.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<RepairOutcome>,
}

impl RepairReport {
    fn from_outcomes(results: Vec<RepairOutcome>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Repair finished: {} succeeded, {} failed",
            self.success_count, self.failure_count
        )
    }
}

/// Backfills `username := openid` for users created without a username.
#[derive(Clone)]
pub struct RepairService {
    users: Arc<dyn UserRepo>,
    event_bus: Option<Arc<EventBus>>,
}

impl RepairService {
    pub fn new(users: Arc<dyn UserRepo>) -> Self {
        Self {
            users,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Update every user missing a username, all at once.
    ///
    /// Only the initial selection can fail the run. Each update's failure is
    /// recorded in its own outcome and never affects the others. Running it
    /// again after a fully successful run selects nobody.
    pub async fn repair_usernames(&self) -> DbResult<RepairReport> {
        let users = self.users.list_missing_username().await?;
        tracing::info!(count = users.len(), "Repairing users without a username");

        let results = join_all(users.iter().map(|user| self.repair_one(user))).await;
        let report = RepairReport::from_outcomes(results);

        tracing::info!(
            success_count = report.success_count,
            failure_count = report.failure_count,
            "Username repair complete"
        );
        metrics::record_repair_outcomes(report.success_count, report.failure_count);

        if let Some(bus) = &self.event_bus {
            bus.publish(ServerEvent::UsernamesRepaired {
                timestamp: Utc::now(),
                success_count: report.success_count,
                failure_count: report.failure_count,
            });
        }

        Ok(report)
    }

    async fn repair_one(&self, user: &User) -> RepairOutcome {
        tracing::debug!(user_id = %user.id, "Setting username from openid");

        match self.users.set_username(user.id, &user.openid, Utc::now()).await {
            Ok(updated) => RepairOutcome {
                user_id: user.id,
                success: true,
                updated: Some(updated),
                error: None,
            },
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to repair username");
                RepairOutcome {
                    user_id: user.id,
                    success: false,
                    updated: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
