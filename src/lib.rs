//! linkcache - a read-through cache for linked account records
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Cached data lookups                                      │
//! │  - Manual resync, health, metrics                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - TTL read-through and refresh                             │
//! │  - Full resync, created/deleted feeds                       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//! ┌───────────────────────────┐  ┌──────────────────────────────┐
//! │        Data Layer         │  │        Backend Client        │
//! │  - SQLite (sqlx)          │  │  - reqwest, JSON over HTTPS  │
//! └───────────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Cache policy and reconciliation
//! - `scheduler`: Periodic incremental sync
//! - `backend`: Remote backend client and wire models
//! - `data`: SQLite cache store
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Cache store
    pub db: Arc<data::Database>,

    /// Read-through cache and sync engine
    pub sync: service::SyncService,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the backend client
    /// 3. Wire up the sync service
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: &config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        // 2. Initialize backend client
        let backend = Arc::new(backend::BackendClient::new(&config.backend)?);
        tracing::info!(base_url = %config.backend.base_url, "Backend client initialized");

        // 3. Initialize sync service
        let sync = service::SyncService::new(
            db.clone(),
            backend,
            config.cache.ttl(),
            config.sync.page_size,
        );

        tracing::info!("Application state initialized successfully");

        Ok(Self { db, sync })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::data_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
