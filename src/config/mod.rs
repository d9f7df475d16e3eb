//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::conversation::EmptySnapshotPolicy;
use crate::error::ChatflowError;

/// Literal prefix of event-stream data lines.
pub const DEFAULT_DATA_PREFIX: &str = "data:";

/// Payload that marks the end of an event stream.
pub const DEFAULT_DONE_SENTINEL: &str = "[DONE]";

/// Runtime configuration for the streaming core.
///
/// # Example
/// ```
/// use chatflow::config::ChatflowConfig;
///
/// let config = ChatflowConfig::builder()
///     .refresh_url("https://api.example.com/auth/refresh")
///     .build();
/// assert_eq!(config.sse_data_prefix, "data:");
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatflowConfig {
    #[builder(into, default = DEFAULT_DATA_PREFIX.to_string())]
    pub sse_data_prefix: String,
    #[builder(into, default = DEFAULT_DONE_SENTINEL.to_string())]
    pub sse_done_sentinel: String,
    /// Snapshot policy while folding a live turn.
    #[builder(default = EmptySnapshotPolicy::Ignore)]
    pub live_empty_snapshot: EmptySnapshotPolicy,
    /// Snapshot policy while rebuilding history.
    #[builder(default = EmptySnapshotPolicy::CreateMessage)]
    pub historical_empty_snapshot: EmptySnapshotPolicy,
    #[builder(into)]
    pub refresh_url: Option<String>,
    #[builder(into, default = default_session_dir())]
    pub session_dir: PathBuf,
}

impl Default for ChatflowConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ChatflowConfig {
    /// Load from environment variables (`CHATFLOW_*`, `.env` honored).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok());
        config
    }

    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ChatflowError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ChatflowError> {
        toml::from_str(raw).map_err(|e| ChatflowError::Configuration(e.to_string()))
    }

    /// File layer (when given) overridden by the environment layer.
    pub fn load(path: Option<&Path>) -> Result<Self, ChatflowError> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay values from a variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("CHATFLOW_SSE_DATA_PREFIX") {
            self.sse_data_prefix = prefix;
        }
        if let Some(sentinel) = lookup("CHATFLOW_SSE_DONE_SENTINEL") {
            self.sse_done_sentinel = sentinel;
        }
        if let Some(url) = lookup("CHATFLOW_REFRESH_URL").filter(|u| !u.trim().is_empty()) {
            self.refresh_url = Some(url);
        }
        if let Some(dir) = lookup("CHATFLOW_SESSION_DIR").filter(|d| !d.trim().is_empty()) {
            self.session_dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("CHATFLOW_HISTORICAL_EMPTY_SNAPSHOT") {
            match policy.parse() {
                Ok(policy) => self.historical_empty_snapshot = policy,
                Err(_) => tracing::warn!(value = %policy, "Ignoring unknown empty snapshot policy"),
            }
        }
    }

    /// Fails when a field would make the decoder unusable.
    pub fn validate(&self) -> Result<(), ChatflowError> {
        if self.sse_data_prefix.is_empty() {
            return Err(ChatflowError::Configuration(
                "sse_data_prefix must not be empty".into(),
            ));
        }
        if let Some(url) = &self.refresh_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ChatflowError::Configuration(format!(
                    "refresh_url must be an http(s) URL: {url}"
                )));
            }
        }
        Ok(())
    }
}

fn default_session_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".chatflow"))
        .unwrap_or_else(|| PathBuf::from(".chatflow"))
}
