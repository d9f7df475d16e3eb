use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::AccessToken;

/// Storage abstraction for the signed-in session.
pub trait SessionStore: Send + Sync {
    fn load(&self, profile: &str) -> Result<Option<AccessToken>, AuthError>;
    fn save(&self, profile: &str, token: &AccessToken) -> Result<(), AuthError>;
    fn clear(&self, profile: &str) -> Result<(), AuthError>;
}

/// File-backed session storage using TOML files.
///
/// # Example
/// ```no_run
/// use chatflow::auth::{AccessToken, FileSessionStore, SessionStore};
///
/// let store = FileSessionStore::new(std::path::PathBuf::from("/tmp/chatflow"));
/// store.save("default", &AccessToken::new("access"))?;
/// # Ok::<(), chatflow::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn from_config(config: &crate::config::ChatflowConfig) -> Self {
        Self::new(config.session_dir.clone())
    }

    fn session_path(&self, profile: &str) -> PathBuf {
        let profile = normalize_label(profile);
        let name = if profile == "default" {
            "session.toml".to_string()
        } else {
            format!("session.{profile}.toml")
        };
        self.base_dir.join(name)
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, profile: &str) -> Result<Option<AccessToken>, AuthError> {
        let path = self.session_path(profile);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: SessionFile = toml::from_str(&raw)?;
        Ok(Some(file.token))
    }

    fn save(&self, profile: &str, token: &AccessToken) -> Result<(), AuthError> {
        let path = self.session_path(profile);
        Self::ensure_parent(&path)?;
        let file = SessionFile {
            version: 1,
            profile: profile.to_string(),
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        let path = self.session_path(profile);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    profile: String,
    saved_at: DateTime<Utc>,
    token: AccessToken,
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let out: String = trimmed
        .chars()
        .map(|ch| ch.to_ascii_lowercase())
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '-' })
        .collect();
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
