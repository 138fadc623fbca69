//! Remote backend access
//!
//! Read-only HTTP client for the service that owns the link records.

mod client;
mod models;

pub use client::{BackendClient, format_timestamp};
pub use models::*;
