//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! URL and endpoint paths, timeouts, which durable storage backend holds
//! remembered sessions, and the last used username.
//!
//! Configuration is stored at `~/.config/guildpass/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "guildpass";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "GUILDPASS_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lower bound for the request timeout; a zero timeout fails every request
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;

/// How long past its `exp` an access token is still sent as-is.
/// Covers clock skew between this machine and the backend.
const DEFAULT_EXPIRY_TOLERANCE_SECS: i64 = 30;

/// Where remembered sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackend {
    /// `session.json` in the config directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub profile_path: String,
    pub request_timeout_secs: u64,
    pub durable_backend: DurableBackend,
    /// Login view unauthenticated users are sent to
    pub login_redirect: String,
    pub expiry_tolerance_secs: i64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            login_path: "/api/token/".to_string(),
            refresh_path: "/api/token/refresh/".to_string(),
            profile_path: "/api/users/me/".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            durable_backend: DurableBackend::File,
            login_redirect: "/login".to_string(),
            expiry_tolerance_secs: DEFAULT_EXPIRY_TOLERANCE_SECS,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(MIN_REQUEST_TIMEOUT_SECS))
    }

    pub fn expiry_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_tolerance_secs.max(0))
    }
}
