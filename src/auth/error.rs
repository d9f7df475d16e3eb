use thiserror::Error;

use crate::error::ChatflowError;

/// Session and token refresh errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Refresh returned no token")]
    NoToken,
    #[error("Refresh rejected: {0}")]
    Rejected(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<ChatflowError> for AuthError {
    fn from(error: ChatflowError) -> Self {
        match error {
            ChatflowError::Network(e) => Self::Network(e.to_string()),
            ChatflowError::Transport(msg) => Self::Network(msg),
            ChatflowError::Api { code, message } => {
                Self::Rejected(format!("{message} (code {code})"))
            }
            ChatflowError::Http { status, message } => {
                Self::Rejected(format!("{message} (status {status})"))
            }
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

impl From<AuthError> for ChatflowError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Network(msg) => ChatflowError::Transport(msg),
            other => ChatflowError::Authentication(other.to_string()),
        }
    }
}
