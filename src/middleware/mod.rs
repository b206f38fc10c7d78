//! Request-level middleware shared by every route.

mod request_id;
mod request_metrics;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use request_metrics::request_metrics_middleware;
