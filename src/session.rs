use crate::config::Connection;
use crate::error::{Error, Result};
use crate::rpc::Credentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding an API key; beats every stored credential.
pub const API_KEY_ENV: &str = "BUGZ_API_KEY";

/// Credentials captured by a login, kept between invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub version: u32,
    pub user: Option<String>,
    pub base: Option<String>,
    pub credentials: Credentials,
    pub created: DateTime<Utc>,
}

impl Session {
    pub fn new(user: Option<String>, base: Option<String>, credentials: Credentials) -> Self {
        Self {
            version: 1,
            user,
            base,
            credentials,
            created: Utc::now(),
        }
    }

    /// Load the session stored at `path`, if any
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(Some(serde_json::from_str(&content)?))
        } else {
            Ok(None)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Forget a stored session; missing files are fine.
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Session file for a named connection
    pub fn session_path(connection: &str) -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "bugz")
            .ok_or_else(|| Error::Config("Could not determine data directory".into()))?;
        Ok(Self::path_in(dirs.data_dir(), connection))
    }

    pub fn path_in(data_dir: &Path, connection: &str) -> PathBuf {
        data_dir.join("sessions").join(format!("{}.json", connection))
    }
}

/// Pick credentials from (in order): env var, stored session, config file.
///
/// A session recorded against a different base URL is ignored.
pub fn resolve_credentials(
    env_key: Option<String>,
    session: Option<&Session>,
    connection: &Connection,
) -> Option<Credentials> {
    if let Some(key) = env_key.filter(|k| !k.is_empty()) {
        return Some(Credentials::ApiKey(key));
    }
    if let Some(session) = session {
        if session.base.is_none() || session.base == connection.base {
            return Some(session.credentials.clone());
        }
    }
    connection.api_key.clone().map(Credentials::ApiKey)
}
