//! Error types for the task client.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no active session; log in first")]
    NoSession,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    Url(String),
}

/// Missing input caught before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub missing: Vec<&'static str>,
}

impl ValidationError {
    pub fn missing(message: impl Into<String>, missing: Vec<&'static str>) -> Self {
        Self {
            message: message.into(),
            missing,
        }
    }
}
