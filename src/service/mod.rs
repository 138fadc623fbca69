//! Service layer
//!
//! Cache policy and reconciliation, separated from the HTTP handlers.
//! The services orchestrate the local store and the backend client.

mod cursor;
mod sync;

pub use cursor::{Feed, INITIAL_LOOKBACK, OVERLAP_WINDOW, SyncCursors};
pub use sync::{RefreshOutcome, SyncReport, SyncService};
