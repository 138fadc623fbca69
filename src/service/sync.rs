//! Cache synchronization service
//!
//! Owns the read-through policy for cached link records and the
//! reconciliation of local rows against the backend:
//!
//! - lazy TTL expiry on reads (a miss by id schedules a background refresh)
//! - single-record refresh with 404 tombstoning
//! - conflict-safe upsert (one delete-and-retry on a uniqueness violation)
//! - full paged resync and incremental created/deleted feeds
//!
//! A record moves `ABSENT -> FRESH -> STALE -> FRESH | ABSENT`. Staleness is
//! only noticed when a row is read.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};

use super::cursor::{Feed, SyncCursors};
use crate::backend::{BackendClient, DataModel};
use crate::data::{CachedData, Database, Page, PageRequest, normalize_uuid};
use crate::error::AppError;
use crate::metrics::{
    CACHE_EXPIRED_TOTAL, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHED_RECORDS,
    CONFLICT_RETRIES_TOTAL, REFRESHES_TOTAL, SYNC_RUNS_TOTAL,
};

/// Upsert retries allowed after a uniqueness violation
const MAX_CONFLICT_RETRIES: u32 = 1;

/// Result of a single-record refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The row was rewritten from the backend
    Refreshed,
    /// The backend no longer has the record; the local row was removed
    Tombstoned,
    /// Refresh failed; the cache was left as it was
    Failed,
}

impl RefreshOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::Tombstoned => "tombstoned",
            Self::Failed => "failed",
        }
    }
}

/// Counters for one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records received from the backend
    pub processed: usize,
    /// Records written to the cache
    pub saved: usize,
    /// Rows removed: tombstones, deleted-feed ids and rows displaced by
    /// another record's identity
    pub deleted: usize,
    /// Records skipped after an error
    pub failed: usize,
    /// The run stopped before the end of the listing
    pub aborted: bool,
}

/// Read-through cache and reconciliation engine
///
/// Cheap to clone; clones share the store, the backend client, the sync
/// cursors and the sync gate.
#[derive(Clone)]
pub struct SyncService {
    db: Arc<Database>,
    backend: Arc<BackendClient>,
    cursors: Arc<Mutex<SyncCursors>>,
    /// Serializes sync cycles and full resyncs
    sync_gate: Arc<tokio::sync::Mutex<()>>,
    ttl: Duration,
    page_size: u32,
}

impl SyncService {
    /// Create a new sync service
    ///
    /// # Arguments
    /// * `ttl` - Age after which a cached row is stale
    /// * `page_size` - Page size used by the full resync
    pub fn new(db: Arc<Database>, backend: Arc<BackendClient>, ttl: Duration, page_size: u32) -> Self {
        Self {
            db,
            backend,
            cursors: Arc::new(Mutex::new(SyncCursors::new())),
            sync_gate: Arc::new(tokio::sync::Mutex::new(())),
            ttl,
            page_size,
        }
    }

    /// Wait for exclusive use of the sync machinery
    pub async fn sync_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.sync_gate.lock().await
    }

    /// Bound used by the most recent poll of `feed`
    pub fn cursor(&self, feed: Feed) -> Option<NaiveDateTime> {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last(feed)
    }

    // =========================================================================
    // Read-through
    // =========================================================================

    /// Get a record by id
    ///
    /// A miss returns `None` at once and refreshes the id in the background,
    /// so the record shows up on a later call. A stale hit is refreshed
    /// before the row is re-read.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<CachedData>, AppError> {
        let Some(data) = self.db.get(id).await? else {
            CACHE_MISSES_TOTAL.with_label_values(&["id"]).inc();
            self.spawn_refresh(id);
            return Ok(None);
        };

        if self.revalidate(&data, "id").await {
            return self.db.get(id).await;
        }
        Ok(Some(data))
    }

    pub async fn get_by_discord_id(&self, discord_id: &str) -> Result<Option<CachedData>, AppError> {
        let Some(data) = self.db.get_by_discord_id(discord_id).await? else {
            CACHE_MISSES_TOTAL.with_label_values(&["discord_id"]).inc();
            return Ok(None);
        };

        if self.revalidate(&data, "discord_id").await {
            return self.db.get_by_discord_id(discord_id).await;
        }
        Ok(Some(data))
    }

    /// Get a record by uuid; dashed and undashed input behave the same
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<CachedData>, AppError> {
        let uuid = normalize_uuid(uuid);
        let Some(data) = self.db.get_by_uuid(&uuid).await? else {
            CACHE_MISSES_TOTAL.with_label_values(&["uuid"]).inc();
            return Ok(None);
        };

        if self.revalidate(&data, "uuid").await {
            return self.db.get_by_uuid(&uuid).await;
        }
        Ok(Some(data))
    }

    /// Get a record by account name, ignoring case
    pub async fn get_by_name(&self, name: &str) -> Result<Option<CachedData>, AppError> {
        let Some(data) = self.db.get_by_name(name).await? else {
            CACHE_MISSES_TOTAL.with_label_values(&["name"]).inc();
            return Ok(None);
        };

        if self.revalidate(&data, "name").await {
            return self.db.get_by_name(name).await;
        }
        Ok(Some(data))
    }

    pub async fn get_page(&self, request: PageRequest) -> Result<Page<CachedData>, AppError> {
        self.db.get_page(request).await
    }

    pub async fn get_page_by_guild_id(
        &self,
        guild_id: &str,
        request: PageRequest,
    ) -> Result<Page<CachedData>, AppError> {
        self.db.get_page_by_guild_id(guild_id, request).await
    }

    /// Refresh `data` if it is stale. Returns `true` when a refresh was attempted.
    async fn revalidate(&self, data: &CachedData, lookup: &str) -> bool {
        if !data.is_stale(self.ttl, Utc::now()) {
            CACHE_HITS_TOTAL.with_label_values(&[lookup]).inc();
            return false;
        }

        CACHE_EXPIRED_TOTAL.with_label_values(&[lookup]).inc();
        tracing::info!(id = data.id, cached_at = %data.cached_at, "Cache expired");
        self.refresh_one(data.id).await;
        true
    }

    fn spawn_refresh(&self, id: i64) {
        let service = self.clone();
        tokio::spawn(async move {
            service.refresh_one(id).await;
        });
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Re-fetch one record from the backend and rewrite its row
    ///
    /// A 404 anywhere in the sequence removes the local row. Any other
    /// failure leaves the cache untouched.
    pub async fn refresh_one(&self, id: i64) -> RefreshOutcome {
        let outcome = match self.fetch_and_save(id).await {
            Ok(_) => RefreshOutcome::Refreshed,
            Err(error) if error.backend_status() == Some(404) => {
                tracing::warn!(id, "No data found on backend, removing cached row");
                match self.db.delete_by_id(id).await {
                    Ok(_) => RefreshOutcome::Tombstoned,
                    Err(error) => {
                        tracing::error!(id, %error, "Failed to remove cached row");
                        RefreshOutcome::Failed
                    }
                }
            }
            Err(error) => {
                tracing::error!(id, %error, "Failed to refresh cached data");
                RefreshOutcome::Failed
            }
        };

        REFRESHES_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
        outcome
    }

    async fn fetch_and_save(&self, id: i64) -> Result<CachedData, AppError> {
        let model = self.backend.get_data(id).await?;

        let removed = self
            .db
            .delete_conflicting(model.id, &model.uuid, &model.user.discord_id)
            .await?;
        if removed > 0 {
            tracing::info!(id, removed, "Removed rows holding the same identity");
        }

        self.save_common(&model).await
    }

    /// Assemble a row from the user and account profiles and upsert it
    ///
    /// If the upsert hits a uniqueness violation the rows holding the same
    /// uuid and discord id are deleted and the upsert is retried once. A
    /// second violation is returned as `AppError::Conflict`.
    pub async fn save_common(&self, model: &DataModel) -> Result<CachedData, AppError> {
        let user = self.backend.get_user(&model.uuid).await?;
        let account = self.backend.get_account(&model.uuid).await?;

        let data = CachedData {
            id: model.id,
            uuid: normalize_uuid(&account.id),
            discord_id: user.id,
            name: account.name,
            tag: user.name,
            avatar: user.avatar,
            guild_id: model.guild.discord_id.clone(),
            created_at: local_to_utc(model.created_at),
            cached_at: Utc::now(),
        };

        let mut retries = 0;
        loop {
            match self.db.upsert(&data).await {
                Ok(()) => {
                    tracing::info!(id = data.id, name = %data.name, "Saved cached data");
                    return Ok(data);
                }
                Err(AppError::Conflict(reason)) if retries < MAX_CONFLICT_RETRIES => {
                    retries += 1;
                    tracing::warn!(
                        id = data.id,
                        uuid = %data.uuid,
                        discord_id = %data.discord_id,
                        %reason,
                        "Identity conflict on save, replacing colliding rows"
                    );
                    self.db.delete_by_uuid(&data.uuid).await?;
                    self.db.delete_by_discord_id(&data.discord_id).await?;
                    CONFLICT_RETRIES_TOTAL.with_label_values(&["retried"]).inc();
                }
                Err(error) => {
                    if matches!(error, AppError::Conflict(_)) {
                        CONFLICT_RETRIES_TOTAL.with_label_values(&["exhausted"]).inc();
                    }
                    return Err(error);
                }
            }
        }
    }

    // =========================================================================
    // Full resync
    // =========================================================================

    /// Walk the backend listing page by page and rewrite every record
    ///
    /// Waits for any running sync cycle. A 404 for any record removes that
    /// row and stops the whole walk. Other backend errors skip the record.
    /// Failures are reported through logs and the returned report.
    pub async fn sync_now(&self) -> SyncReport {
        let _guard = self.sync_guard().await;
        self.full_resync().await
    }

    /// Start a full resync in the background unless a sync already holds
    /// the gate. Returns `false` when the request was dropped.
    pub fn try_start_sync_now(&self) -> bool {
        let Ok(guard) = self.sync_gate.clone().try_lock_owned() else {
            tracing::info!("Sync already running, full resync not started");
            return false;
        };

        let service = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            service.full_resync().await;
        });
        true
    }

    /// Caller holds the sync gate
    async fn full_resync(&self) -> SyncReport {
        tracing::info!(page_size = self.page_size, "Starting full resync");

        let mut report = SyncReport::default();
        let status = match self.walk_listing(&mut report).await {
            Ok(()) if report.aborted => "aborted",
            Ok(()) => "success",
            Err(error) => {
                tracing::error!(%error, "Full resync failed");
                report.aborted = true;
                "error"
            }
        };

        SYNC_RUNS_TOTAL.with_label_values(&["full", status]).inc();
        self.record_cache_size().await;
        tracing::info!(
            processed = report.processed,
            saved = report.saved,
            deleted = report.deleted,
            failed = report.failed,
            aborted = report.aborted,
            "Full resync finished"
        );
        report
    }

    async fn walk_listing(&self, report: &mut SyncReport) -> Result<(), AppError> {
        let mut page = 0;
        let mut total_pages = 1;

        while page < total_pages {
            let listing = self.backend.get_data_page(page, self.page_size).await?;
            // The backend may report fewer pages as the walk goes on
            total_pages = listing.total_pages;
            if page >= total_pages {
                break;
            }

            for model in &listing.content {
                report.processed += 1;
                tracing::info!(id = model.id, "Syncing data");

                report.deleted += self.clear_identity(model).await? as usize;
                match self.save_common(model).await {
                    Ok(_) => report.saved += 1,
                    Err(error) if error.backend_status() == Some(404) => {
                        tracing::error!(id = model.id, "No data found on backend, stopping resync");
                        report.deleted += self.db.delete_by_id(model.id).await? as usize;
                        report.aborted = true;
                        return Ok(());
                    }
                    Err(AppError::Backend(error)) => {
                        tracing::error!(
                            id = model.id,
                            uuid = %model.uuid,
                            status = ?error.status(),
                            %error,
                            "Backend failed for record"
                        );
                        report.failed += 1;
                    }
                    Err(error) => return Err(error),
                }
            }

            page += 1;
        }

        Ok(())
    }

    /// Remove every row holding the record's uuid or discord id, its own
    /// row included. Returns how many rows of other ids were displaced.
    async fn clear_identity(&self, model: &DataModel) -> Result<u64, AppError> {
        let displaced = self
            .db
            .delete_conflicting(model.id, &model.uuid, &model.user.discord_id)
            .await?;
        self.db.delete_by_uuid(&model.uuid).await?;
        self.db.delete_by_discord_id(&model.user.discord_id).await?;
        Ok(displaced)
    }

    // =========================================================================
    // Incremental sync
    // =========================================================================

    /// Cache records created on the backend since the created cursor
    ///
    /// # Errors
    /// Returns an error only if the feed itself cannot be fetched
    pub async fn sync_created(&self) -> Result<SyncReport, AppError> {
        let bound = self.next_bound(Feed::Created);
        let feed = match self.backend.get_created_after(bound).await {
            Ok(feed) => feed,
            Err(error) => {
                SYNC_RUNS_TOTAL.with_label_values(&["created", "error"]).inc();
                return Err(error.into());
            }
        };

        let mut report = SyncReport::default();
        for model in &feed {
            report.processed += 1;
            tracing::info!(id = model.id, "Adding new data");

            match self.save_common(model).await {
                Ok(_) => report.saved += 1,
                Err(error) => {
                    tracing::error!(id = model.id, %error, "Failed to cache data");
                    if !error.is_transient() {
                        report.failed += 1;
                        continue;
                    }

                    tracing::warn!(id = model.id, "Attempting once again to cache data");
                    match self.save_common(model).await {
                        Ok(_) => report.saved += 1,
                        Err(error) => {
                            tracing::error!(id = model.id, %error, "Failed again, giving up");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        SYNC_RUNS_TOTAL.with_label_values(&["created", "success"]).inc();
        self.record_cache_size().await;
        Ok(report)
    }

    /// Remove records deleted on the backend since the deleted cursor
    ///
    /// # Errors
    /// Returns an error only if the feed itself cannot be fetched
    pub async fn sync_deleted(&self) -> Result<SyncReport, AppError> {
        let bound = self.next_bound(Feed::Deleted);
        let feed = match self.backend.get_deleted_after(bound).await {
            Ok(feed) => feed,
            Err(error) => {
                SYNC_RUNS_TOTAL.with_label_values(&["deleted", "error"]).inc();
                return Err(error.into());
            }
        };

        let mut report = SyncReport::default();
        for model in &feed {
            report.processed += 1;
            tracing::info!(id = model.id, "Removing old data");

            match self.db.delete_by_id(model.id).await {
                Ok(removed) => report.deleted += removed as usize,
                Err(error) => {
                    tracing::error!(id = model.id, %error, "Failed to delete data");
                    report.failed += 1;
                }
            }
        }

        SYNC_RUNS_TOTAL.with_label_values(&["deleted", "success"]).inc();
        self.record_cache_size().await;
        Ok(report)
    }

    fn next_bound(&self, feed: Feed) -> NaiveDateTime {
        let now = Local::now().naive_local();
        let bound = self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .next_bound(feed, now);
        tracing::debug!(feed = feed.as_str(), %bound, "Computed sync bound");
        bound
    }

    async fn record_cache_size(&self) {
        match self.db.count().await {
            Ok(total) => CACHED_RECORDS.set(total as i64),
            Err(error) => tracing::warn!(%error, "Failed to count cached records"),
        }
    }
}

/// Backend timestamps are local date-times
fn local_to_utc(time: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&time)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| time.and_utc())
}
