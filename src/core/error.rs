// Centralized error handling for the remote client

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the Web API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Credentials rejected or session expired
    #[error("{0}")]
    Auth(String),

    #[error("API request failed ({status}) {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Validation(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid host URL '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Auth("Authentication failed or session expired".to_string())
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { source, .. } => !source.is_builder(),
            ApiError::Api { status, .. } => {
                *status >= 500
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
            }
            _ => false,
        }
    }
}

/// Settings persistence failures, reported to the user as strings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to access settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum AssociationError {
    #[error("File association support is available only on Linux desktops")]
    Unsupported,

    #[error("Could not determine the applications directory")]
    NoDataDir,

    #[error("Failed to update {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
