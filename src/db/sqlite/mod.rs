mod common;
mod delivery_stats;
mod scan_records;
mod users;

pub use delivery_stats::SqliteDeliveryStatsRepo;
pub use scan_records::SqliteScanRecordRepo;
pub use users::SqliteUserRepo;
