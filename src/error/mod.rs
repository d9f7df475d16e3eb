//! Error types for Chatflow.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Primary error type for all Chatflow operations.
#[derive(Error, Debug)]
pub enum ChatflowError {
    /// The caller cancelled the stream. Not a user-facing failure.
    #[error("Stream aborted")]
    Aborted,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend answered with a non-zero envelope code.
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Coarse error taxonomy used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// Intentional stop; callers should stay quiet.
    Cancelled,
    /// Connection-level failure.
    Transport,
    /// Malformed data on the wire.
    Protocol,
    /// The backend or refresh flow rejected the request.
    Application,
    Configuration,
}

impl ChatflowError {
    /// Create an API envelope error.
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Aborted => ErrorCategory::Cancelled,
            Self::Network(_) | Self::Transport(_) | Self::Io(_) => ErrorCategory::Transport,
            Self::Serialization(_) => ErrorCategory::Protocol,
            Self::Api { .. } | Self::Http { .. } | Self::Authentication(_) => {
                ErrorCategory::Application
            }
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::Application,
        }
    }

    /// Whether the failure came from an intentional cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Whether the failure is one the user should see.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Cancelled | ErrorCategory::Protocol
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChatflowError>;
