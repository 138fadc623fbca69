//! Error types for linkcache
//!
//! Backend failures are reported as `BackendError` so the sync engine can
//! branch on the upstream status code. Everything else is converted to
//! `AppError`, which implements `IntoResponse` for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure talking to the remote backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network failure, timeout or unreachable origin
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the backend
    #[error("backend responded with HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// HTTP status reported by the backend, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }

    /// The backend no longer has the requested record
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Transport resets worth a single immediate retry.
    ///
    /// HTTP/2 `GOAWAY` frames surface as a message rather than a dedicated
    /// error kind, so they are matched on text.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || error_chain_mentions(e, "GOAWAY")
            }
            Self::Status { message, .. } => message.contains("GOAWAY"),
            Self::Decode(_) => false,
        }
    }
}

fn error_chain_mentions(error: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.to_string().contains(needle) {
            return true;
        }
        current = err.source();
    }
    false
}

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Record is not in the local cache (404)
    #[error("Resource not found")]
    NotFound,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local uniqueness violation on upsert (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote backend error (502)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Backend status code carried by this error, if it came from the backend
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            Self::Backend(e) => e.status(),
            _ => None,
        }
    }

    /// `true` for a transient transport failure of the backend
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Short label used for the error metric
    fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Backend(_) => "backend",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Backend(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
