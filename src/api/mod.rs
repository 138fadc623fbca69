//! API layer
//!
//! HTTP handlers for:
//! - Cached data lookups
//! - Manual resync trigger
//! - Metrics (Prometheus)

mod data;
pub mod metrics;

pub use data::data_router;
pub use metrics::metrics_router;
