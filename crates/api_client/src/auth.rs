//! Token storage.
//!
//! Reads/writes ~/.config/plan-choque/auth.json (0600 on Unix). Older
//! installs wrote the token under `authToken`; both keys are read, only
//! `token` is written.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

/// Credentials stored locally after `login`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCredentials {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl StoredCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), api_base: None, email: None }
    }

    /// Decode a stored file. Returns None when no usable token is present.
    pub fn from_json(contents: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(contents).ok()?;
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let token = text("token").or_else(|| text("authToken"))?;
        Some(Self { token, api_base: text("api_base"), email: text("email") })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize credentials: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("plan-choque/auth.json"))
}

/// Load saved credentials. None when missing or invalid.
pub fn load_auth() -> Option<StoredCredentials> {
    load_auth_from(&auth_file_path()?)
}

pub fn load_auth_from(path: &Path) -> Option<StoredCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    StoredCredentials::from_json(&contents)
}

pub fn save_auth(creds: &StoredCredentials) -> Result<PathBuf, StoreError> {
    let path = auth_file_path().ok_or(StoreError::NoConfigDir)?;
    save_auth_to(&path, creds)?;
    Ok(path)
}

/// Write credentials, creating the parent directory. 0600 on Unix.
pub fn save_auth_to(path: &Path, creds: &StoredCredentials) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let contents = serde_json::to_string_pretty(creds)?;
    std::fs::write(path, contents).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }

    Ok(())
}

/// Delete saved credentials. Missing file is not an error.
pub fn delete_auth() -> Result<(), StoreError> {
    match auth_file_path() {
        Some(path) => delete_auth_at(&path),
        None => Ok(()),
    }
}

pub fn delete_auth_at(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}
