//! Data layer module
//!
//! Handles persistence of the cached link records:
//! - SQLite database operations
//! - Row and paging models

mod database;
mod models;

pub use database::Database;
pub use models::*;
