//! Backend HTTP client
//!
//! Every call is a plain GET. Non-2xx responses are translated into
//! `BackendError::Status`; retry policy belongs to the caller.

use std::time::Instant;

use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::models::{AccountModel, DataModel, ErrorModel, PagedDataModel, UserModel};
use crate::config::BackendConfig;
use crate::error::{AppError, BackendError};

/// Format a cursor timestamp the way the backend parses it
pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Read-only client for the link backend
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client with its own connection pool from configuration
    ///
    /// # Errors
    /// Returns `AppError::Config` for an unusable base URL
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Self::with_http_client(http_client, &config.base_url)
    }

    /// Build a client around an existing `reqwest::Client`
    pub fn with_http_client(http_client: reqwest::Client, base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid backend URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "backend URL cannot be used as a base: {base_url}"
            )));
        }

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// GET /data?page={page}&size={size}
    pub async fn get_data_page(&self, page: u32, size: u32) -> Result<PagedDataModel, BackendError> {
        let mut url = self.url(&["data"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        self.get_json("data_page", url).await
    }

    /// GET /data/{id}
    pub async fn get_data(&self, id: i64) -> Result<DataModel, BackendError> {
        let url = self.url(&["data", &id.to_string()]);
        self.get_json("data", url).await
    }

    /// GET /user/{uuid}
    pub async fn get_user(&self, uuid: &str) -> Result<UserModel, BackendError> {
        let url = self.url(&["user", uuid]);
        self.get_json("user", url).await
    }

    /// GET /cache/uuid/{uuid}
    pub async fn get_account(&self, uuid: &str) -> Result<AccountModel, BackendError> {
        let url = self.url(&["cache", "uuid", uuid]);
        self.get_json("account", url).await
    }

    /// GET /data/created/after/{time}
    pub async fn get_created_after(
        &self,
        time: NaiveDateTime,
    ) -> Result<Vec<DataModel>, BackendError> {
        let url = self.url(&["data", "created", "after", &format_timestamp(time)]);
        let data: Option<Vec<DataModel>> = self.get_json("created_after", url).await?;
        Ok(data.unwrap_or_default())
    }

    /// GET /data/deleted/after/{time}
    pub async fn get_deleted_after(
        &self,
        time: NaiveDateTime,
    ) -> Result<Vec<DataModel>, BackendError> {
        let url = self.url(&["data", "deleted", "after", &format_timestamp(time)]);
        let data: Option<Vec<DataModel>> = self.get_json("deleted_after", url).await?;
        Ok(data.unwrap_or_default())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, BackendError> {
        let started = Instant::now();
        let result = self.send(url).await;

        let outcome = match &result {
            Ok(_) => "success".to_string(),
            Err(BackendError::Status { status, .. }) => status.to_string(),
            Err(BackendError::Transport(_)) => "transport".to_string(),
            Err(BackendError::Decode(_)) => "decode".to_string(),
        };
        crate::metrics::observe_backend_request(endpoint, &outcome, started.elapsed());

        let body = result?;
        decode_body(&body)
    }

    async fn send(&self, url: Url) -> Result<String, BackendError> {
        tracing::debug!(url = %url, "Backend request");

        let response = self
            .http_client
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        classify_response(status, body)
    }
}

/// Map a backend response to its body or a typed failure
fn classify_response(status: StatusCode, body: String) -> Result<String, BackendError> {
    match status {
        StatusCode::OK | StatusCode::NO_CONTENT => Ok(body),
        StatusCode::INTERNAL_SERVER_ERROR => {
            let message = serde_json::from_str::<ErrorModel>(&body)
                .map(|model| model.message)
                .unwrap_or_else(|_| format!("Response code {}", status.as_u16()));
            Err(BackendError::Status {
                status: status.as_u16(),
                message,
            })
        }
        other => Err(BackendError::Status {
            status: other.as_u16(),
            message: format!("Response code {}", other.as_u16()),
        }),
    }
}

/// An empty body (e.g. 204) decodes as JSON `null`
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}
