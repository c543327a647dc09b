use thiserror::Error;

use crate::error::{ApiError, ValidationError};

/// A blocking, user-visible message raised by a user-initiated action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{title}: {message}")]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("Success", message)
    }

    pub fn something_went_wrong() -> Self {
        Self::error("Something went wrong.")
    }

    /// Non-2xx responses get `on_status`; transport and local failures get the
    /// generic message.
    pub fn for_api_error(err: &ApiError, on_status: &str) -> Self {
        match err {
            ApiError::Status { .. } => Self::error(on_status),
            _ => Self::something_went_wrong(),
        }
    }
}

impl From<ValidationError> for Notice {
    fn from(err: ValidationError) -> Self {
        Notice::new("Validation Error", err.message)
    }
}
