//! Common test utilities for E2E tests
//!
//! `MockBackend` is an in-process axum server that answers the backend
//! routes from shared state, with per-path failure injection and a log of
//! every request it served.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, NaiveDateTime};
use linkcache::backend::{
    AccountModel, BackendClient, DataModel, LinkedGuild, LinkedUser, PagedDataModel, UserModel,
};
use linkcache::data::{CachedData, Database};
use linkcache::service::SyncService;
use linkcache::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

// =============================================================================
// Mock backend
// =============================================================================

/// Injected failure for one request path
#[derive(Debug, Clone)]
pub struct Failure {
    pub status: u16,
    pub message: String,
    /// Number of requests that still fail
    pub remaining: usize,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub records: HashMap<i64, DataModel>,
    /// Discord profiles keyed by the uuid they are requested with
    pub users: HashMap<String, UserModel>,
    /// Account profiles keyed by the uuid they are requested with
    pub accounts: HashMap<String, AccountModel>,
    /// Listing responses by page index
    pub listing: Vec<PagedDataModel>,
    pub created: Vec<DataModel>,
    pub deleted: Vec<DataModel>,
    pub failures: HashMap<String, Failure>,
    /// Paths served, without the `/api` prefix
    pub requests: Vec<String>,
    /// Raw `after` segments of feed requests
    pub created_after: Vec<String>,
    pub deleted_after: Vec<String>,
}

impl MockState {
    /// Register a linked record with consistent user and account profiles
    pub fn add_linked(&mut self, id: i64, uuid: &str, discord_id: &str, name: &str, guild_id: &str) {
        let model = data_model(id, uuid, discord_id, guild_id);
        self.records.insert(id, model);
        self.users.insert(
            uuid.to_string(),
            UserModel {
                id: discord_id.to_string(),
                name: format!("{}#0001", name.to_lowercase()),
                avatar: Some(format!("https://cdn.example.com/{discord_id}.png")),
            },
        );
        self.accounts.insert(
            uuid.to_string(),
            AccountModel {
                id: uuid.replace('-', ""),
                name: name.to_string(),
            },
        );
    }

    /// Fail the next `times` requests for `path` (e.g. "/data/5").
    /// A trailing `/` makes it a prefix match.
    pub fn fail(&mut self, path: &str, status: u16, message: &str, times: usize) {
        self.failures.insert(
            path.to_string(),
            Failure {
                status,
                message: message.to_string(),
                remaining: times,
            },
        );
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests.iter().filter(|p| p.as_str() == path).count()
    }
}

/// Listing page holding the given records
pub fn listing_page(records: Vec<DataModel>, number: u32, total_pages: u32) -> PagedDataModel {
    PagedDataModel {
        total_elements: records.len() as u64,
        size: records.len() as u32,
        empty: records.is_empty(),
        content: records,
        total_pages,
        last: number + 1 >= total_pages,
        number,
        first: number == 0,
    }
}

pub fn data_model(id: i64, uuid: &str, discord_id: &str, guild_id: &str) -> DataModel {
    DataModel {
        id,
        uuid: uuid.to_string(),
        user: LinkedUser {
            discord_id: discord_id.to_string(),
        },
        guild: LinkedGuild {
            discord_id: guild_id.to_string(),
        },
        created_at: created_at(),
    }
}

pub fn created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

pub type SharedMockState = Arc<Mutex<MockState>>;

/// Running mock backend
pub struct MockBackend {
    /// API root to hand to `BackendClient`
    pub base_url: String,
    pub state: SharedMockState,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: SharedMockState = Arc::new(Mutex::new(MockState::default()));

        let app = Router::new()
            .fallback(handle_backend)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    /// Mutate the backend state
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn client(&self) -> BackendClient {
        BackendClient::with_http_client(reqwest::Client::new(), &self.base_url).unwrap()
    }
}

async fn handle_backend(
    State(state): State<SharedMockState>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
) -> Response {
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .to_string();

    let mut state = state.lock().unwrap();
    state.requests.push(path.clone());

    let failure = state
        .failures
        .iter_mut()
        .find(|(key, failure)| failure.remaining > 0 && path_matches(key, &path));
    if let Some((_, failure)) = failure {
        failure.remaining -= 1;
        return failure_response(failure);
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["data"] => {
            let page: usize = params
                .get("page")
                .and_then(|p| p.parse().ok())
                .unwrap_or(0);
            let listing = state
                .listing
                .get(page)
                .cloned()
                .unwrap_or_else(|| listing_page(Vec::new(), page as u32, 0));
            Json(listing).into_response()
        }
        ["data", "created", "after", after] => {
            state.created_after.push(after.to_string());
            feed_response(&state.created)
        }
        ["data", "deleted", "after", after] => {
            state.deleted_after.push(after.to_string());
            feed_response(&state.deleted)
        }
        ["data", id] => {
            let record = id.parse::<i64>().ok().and_then(|id| state.records.get(&id));
            match record {
                Some(record) => Json(record.clone()).into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
        ["user", uuid] => match state.users.get(*uuid) {
            Some(user) => Json(user.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        ["cache", "uuid", uuid] => match state.accounts.get(*uuid) {
            Some(account) => Json(account.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A key ending in `/` matches every path below it
fn path_matches(key: &str, path: &str) -> bool {
    path == key || (key.ends_with('/') && path.starts_with(key))
}

/// An empty feed answers 204 without a body
fn feed_response(feed: &[DataModel]) -> Response {
    if feed.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(feed.to_vec()).into_response()
    }
}

fn failure_response(failure: &Failure) -> Response {
    let status = StatusCode::from_u16(failure.status).unwrap();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        (
            status,
            Json(serde_json::json!({ "message": failure.message })),
        )
            .into_response()
    } else {
        status.into_response()
    }
}

// =============================================================================
// Engine harness
// =============================================================================

/// Sync service wired to a mock backend and a temporary database
pub struct TestEngine {
    pub backend: MockBackend,
    pub db: Arc<Database>,
    pub db_path: std::path::PathBuf,
    pub service: SyncService,
    pub _temp_dir: TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::with_ttl(chrono::Duration::hours(1)).await
    }

    pub async fn with_ttl(ttl: chrono::Duration) -> Self {
        let backend = MockBackend::start().await;

        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());

        let service = SyncService::new(db.clone(), Arc::new(backend.client()), ttl, 30);

        Self {
            backend,
            db,
            db_path,
            service,
            _temp_dir: temp_dir,
        }
    }

    /// Run raw SQL against the cache file over a separate connection
    pub async fn execute_sql(&self, sql: &str) {
        let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", self.db_path.display()))
            .await
            .unwrap();
        sqlx::query(sql).execute(&pool).await.unwrap();
        pool.close().await;
    }

    /// Run a scalar count query over a separate connection
    pub async fn query_count(&self, sql: &str) -> i64 {
        let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", self.db_path.display()))
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&pool).await.unwrap();
        pool.close().await;
        count
    }

    /// Insert a row directly into the cache
    pub async fn seed(&self, data: &CachedData) {
        self.db.upsert(data).await.unwrap();
    }

    /// Poll until the row for `id` satisfies `predicate` or two seconds pass
    pub async fn wait_for_row(
        &self,
        id: i64,
        predicate: impl Fn(Option<&CachedData>) -> bool,
    ) -> Option<CachedData> {
        for _ in 0..40 {
            let row = self.db.get(id).await.unwrap();
            if predicate(row.as_ref()) {
                return row;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("row {id} did not reach the expected state");
    }
}

/// Cached row with the same shape `MockState::add_linked` produces
pub fn cached_row(id: i64, uuid: &str, discord_id: &str, name: &str, guild_id: &str) -> CachedData {
    let now = chrono::Utc::now();
    CachedData {
        id,
        uuid: uuid.replace('-', ""),
        discord_id: discord_id.to_string(),
        name: name.to_string(),
        tag: format!("{}#0001", name.to_lowercase()),
        avatar: None,
        guild_id: guild_id.to_string(),
        created_at: now - chrono::Duration::days(30),
        cached_at: now,
    }
}

// =============================================================================
// HTTP server
// =============================================================================

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub backend: MockBackend,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance backed by a fresh mock backend
    pub async fn new() -> Self {
        let backend = MockBackend::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: config::DatabaseConfig { path: db_path },
            backend: config::BackendConfig {
                base_url: backend.base_url.clone(),
                timeout_seconds: 5,
                user_agent: "linkcache-test".to_string(),
            },
            sync: config::SyncConfig {
                interval_seconds: 300,
                page_size: 30,
                full_sync_on_startup: false,
            },
            cache: config::CacheConfig { ttl_seconds: 3600 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(&config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = linkcache::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            backend,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}
