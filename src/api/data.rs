//! Cached data endpoints
//!
//! Read-only lookups over the cache. Every lookup goes through
//! `SyncService`, so stale rows are refreshed before they are returned.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::data::{CachedData, Page, PageRequest};
use crate::error::AppError;

/// Create data router
///
/// Routes:
/// - GET /data - Page through cached records
/// - GET /data/:id - Get by backend id
/// - GET /data/discord/:discord_id - Get by Discord id
/// - GET /data/uuid/:uuid - Get by account uuid
/// - GET /data/name/:name - Get by account name
/// - GET /data/guild/:guild_id - Page through one guild
/// - POST /sync - Trigger a full resync
pub fn data_router() -> Router<AppState> {
    Router::new()
        .route("/data", get(list_data))
        .route("/data/:id", get(get_data))
        .route("/data/discord/:discord_id", get(get_by_discord_id))
        .route("/data/uuid/:uuid", get(get_by_uuid))
        .route("/data/name/:name", get(get_by_name))
        .route("/data/guild/:guild_id", get(list_by_guild))
        .route("/sync", post(trigger_sync))
}

// =============================================================================
// Lookups
// =============================================================================

/// GET /api/data
async fn list_data(
    State(state): State<AppState>,
    Query(request): Query<PageRequest>,
) -> Result<Json<Page<CachedData>>, AppError> {
    let page = state.sync.get_page(request).await?;
    Ok(Json(page))
}

/// GET /api/data/:id
///
/// A miss answers 404 and schedules a refresh of the id.
async fn get_data(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CachedData>, AppError> {
    let data = state.sync.get_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(data))
}

/// GET /api/data/discord/:discord_id
async fn get_by_discord_id(
    State(state): State<AppState>,
    Path(discord_id): Path<String>,
) -> Result<Json<CachedData>, AppError> {
    let data = state
        .sync
        .get_by_discord_id(&discord_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(data))
}

/// GET /api/data/uuid/:uuid
async fn get_by_uuid(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<CachedData>, AppError> {
    let data = state
        .sync
        .get_by_uuid(&uuid)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(data))
}

/// GET /api/data/name/:name
async fn get_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CachedData>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    let data = state
        .sync
        .get_by_name(name)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(data))
}

/// GET /api/data/guild/:guild_id
async fn list_by_guild(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
    Query(request): Query<PageRequest>,
) -> Result<Json<Page<CachedData>>, AppError> {
    let page = state.sync.get_page_by_guild_id(&guild_id, request).await?;
    Ok(Json(page))
}

// =============================================================================
// Sync
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub status: &'static str,
}

/// POST /api/sync
///
/// Starts a full resync in the background and answers 202. While a
/// scheduled cycle or another resync holds the sync gate the request is
/// dropped with 409, so requests never queue up behind each other.
async fn trigger_sync(State(state): State<AppState>) -> (StatusCode, Json<SyncStatus>) {
    if !state.sync.try_start_sync_now() {
        return (
            StatusCode::CONFLICT,
            Json(SyncStatus {
                status: "already_running",
            }),
        );
    }

    tracing::info!("Full resync requested");
    (StatusCode::ACCEPTED, Json(SyncStatus { status: "accepted" }))
}
