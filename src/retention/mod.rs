//! Data retention: purging delivery stats and scan records that are older
//! than a whole number of calendar months.
//!
//! - [`cutoff`] computes the boundary (first of a month, midnight UTC)
//! - [`purger`] deletes matching records in bounded concurrent batches
//! - [`worker`] runs full passes on demand or on a timer

pub mod cutoff;
pub mod purger;
mod worker;

pub use cutoff::{DEFAULT_RETAIN_MONTHS, compute_cutoff, compute_cutoff_with_months};
pub use purger::{BatchPurger, DEFAULT_BATCH_SIZE, PurgeError, PurgeResult};
pub use worker::{CleanupReport, RetentionRunner, start_retention_worker};
