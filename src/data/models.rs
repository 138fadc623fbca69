//! Data models
//!
//! Rust structs representing cached rows and paging envelopes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Cached Data
// =============================================================================

/// Cached projection of a backend link record
///
/// `id` is assigned by the backend. `uuid` and `discord_id` are each unique
/// across all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CachedData {
    pub id: i64,
    /// Account uuid without dashes
    pub uuid: String,
    pub discord_id: String,
    /// Account name
    pub name: String,
    /// Discord tag
    pub tag: String,
    /// Discord avatar URL
    pub avatar: Option<String>,
    pub guild_id: String,
    /// When the backend created the record
    pub created_at: DateTime<Utc>,
    /// When this row was last written
    pub cached_at: DateTime<Utc>,
}

impl CachedData {
    /// A row is stale once `ttl` has passed since it was written
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.cached_at + ttl < now
    }
}

/// Strip dashes so dashed and undashed uuids compare equal
pub fn normalize_uuid(uuid: &str) -> String {
    uuid.replace('-', "")
}

// =============================================================================
// Paging
// =============================================================================

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "PageRequest::default_size")]
    pub size: u32,
}

impl PageRequest {
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    fn default_size() -> u32 {
        20
    }

    /// Page size clamped to `1..=MAX_SIZE`
    pub fn limit(&self) -> u32 {
        self.size.clamp(1, Self::MAX_SIZE)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.limit())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::default_size())
    }
}

/// One page of results with the same envelope the backend uses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
    pub number: u32,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.limit();
        let total_pages =
            u32::try_from(total_elements.div_ceil(u64::from(size))).unwrap_or(u32::MAX);
        let number = request.page;

        Self {
            empty: content.is_empty(),
            content,
            total_pages,
            total_elements,
            size,
            number,
            first: number == 0,
            last: u64::from(number) + 1 >= u64::from(total_pages),
        }
    }
}
