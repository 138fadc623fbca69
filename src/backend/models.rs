//! Backend wire models
//!
//! Only the fields the cache touches are modelled; unknown fields are
//! ignored by serde.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A link record as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    pub id: i64,
    /// Account uuid, may or may not contain dashes
    pub uuid: String,
    pub user: LinkedUser,
    pub guild: LinkedGuild,
    pub created_at: NaiveDateTime,
}

/// Discord user the record is linked to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedUser {
    pub discord_id: String,
}

/// Guild the record belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedGuild {
    pub discord_id: String,
}

/// Discord profile for an account uuid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserModel {
    /// Discord id
    pub id: String,
    /// Discord tag
    pub name: String,
    pub avatar: Option<String>,
}

/// Game account profile for an account uuid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountModel {
    /// Undashed uuid
    pub id: String,
    pub name: String,
}

/// Paged listing envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedDataModel {
    #[serde(default)]
    pub content: Vec<DataModel>,
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub last: bool,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub empty: bool,
}

/// Error payload returned with HTTP 500
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorModel {
    pub message: String,
}
