//! Service layer: the operations exposed over HTTP and the CLI, built on
//! the repository traits.

mod repair;
mod scans;
mod stats;

use std::sync::Arc;

pub use repair::{RepairOutcome, RepairReport, RepairService};
pub use scans::ScanService;
pub use stats::StatsService;

use crate::{config::RetentionConfig, db::DbPool, events::EventBus, retention::RetentionRunner};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub stats: StatsService,
    pub scans: ScanService,
    pub repair: RepairService,
    pub retention: Arc<RetentionRunner>,
}

impl Services {
    pub fn new(db: Arc<DbPool>, retention: RetentionConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            stats: StatsService::new(db.delivery_stats()),
            scans: ScanService::new(db.scan_records()).with_event_bus(event_bus.clone()),
            repair: RepairService::new(db.users()).with_event_bus(event_bus.clone()),
            retention: Arc::new(RetentionRunner::new(db, retention).with_event_bus(event_bus)),
        }
    }
}
