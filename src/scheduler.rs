//! Background sync scheduler
//!
//! Runs the incremental sync cycle (deleted feed, then created feed) right
//! away and then on a fixed interval.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::service::{SyncReport, SyncService};

/// Spawn the periodic sync task
///
/// The first tick fires immediately. A cycle that overruns the interval
/// drops the ticks it missed instead of bursting to catch up, so cycles
/// never overlap. If `full_sync_on_startup` is set a full resync runs once
/// before the first cycle.
pub fn spawn_sync_task(
    service: SyncService,
    interval: Duration,
    full_sync_on_startup: bool,
) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        if full_sync_on_startup {
            tracing::info!("Running startup full resync...");
            service.sync_now().await;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            run_cycle(&service).await;
        }
    });

    tracing::info!(interval_secs = interval.as_secs(), "Sync task spawned");
    handle
}

/// One incremental cycle. Failures are logged and never end the task.
pub async fn run_cycle(service: &SyncService) {
    let _guard = service.sync_guard().await;
    tracing::info!("Running scheduled sync...");

    match service.sync_deleted().await {
        Ok(report) => log_report("deleted", &report),
        Err(error) => tracing::error!(%error, "Failed to sync deleted data"),
    }

    match service.sync_created().await {
        Ok(report) => log_report("created", &report),
        Err(error) => tracing::error!(%error, "Failed to sync created data"),
    }
}

fn log_report(feed: &str, report: &SyncReport) {
    tracing::info!(
        feed,
        processed = report.processed,
        saved = report.saved,
        deleted = report.deleted,
        failed = report.failed,
        "Sync completed"
    );
}
