use crate::error::{Error, Result};
use crate::rpc::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name used when no connection is configured or selected.
pub const DEFAULT_CONNECTION: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default_connection: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, Connection>,
}

/// Settings for talking to one Bugzilla instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub base: Option<String>,
    pub service: Dialect,
    /// Domain appended to bare user names, `gentoo.org` or `@gentoo.org`
    pub suffix: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
    pub verify: bool,
    /// Maximum number of calls in flight at once
    pub concurrent: usize,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            base: None,
            service: Dialect::default(),
            suffix: None,
            user: None,
            password: None,
            api_key: None,
            timeout: 30,
            verify: true,
            concurrent: 4,
        }
    }
}

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base: Option<String>,
    pub service: Option<Dialect>,
    pub suffix: Option<String>,
    pub user: Option<String>,
    pub timeout: Option<u64>,
    pub insecure: bool,
    pub concurrent: Option<usize>,
}

impl Connection {
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(base) = &overrides.base {
            self.base = Some(base.clone());
        }
        if let Some(service) = overrides.service {
            self.service = service;
        }
        if let Some(suffix) = &overrides.suffix {
            self.suffix = Some(suffix.clone());
        }
        if let Some(user) = &overrides.user {
            self.user = Some(user.clone());
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        if overrides.insecure {
            self.verify = false;
        }
        if let Some(concurrent) = overrides.concurrent {
            self.concurrent = concurrent;
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "bugz")
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Resolve a connection by name, falling back to `default_connection`.
    ///
    /// An explicitly named connection must exist; with nothing configured
    /// at all, an empty connection is returned so command-line flags can
    /// supply everything.
    pub fn connection(&self, name: Option<&str>) -> Result<(String, Connection)> {
        if let Some(name) = name {
            return self
                .connections
                .get(name)
                .map(|c| (name.to_string(), c.clone()))
                .ok_or_else(|| Error::Config(format!("unknown connection '{}'", name)));
        }
        match &self.default_connection {
            Some(name) => self.connection(Some(name)),
            None => Ok((
                DEFAULT_CONNECTION.to_string(),
                self.connections.get(DEFAULT_CONNECTION).cloned().unwrap_or_default(),
            )),
        }
    }
}
