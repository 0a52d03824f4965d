//! Configuration data model.

use serde::{Deserialize, Serialize};

use super::defaults::{
    DEFAULT_BASE_URL, DEFAULT_REFRESH_COOKIE, DEFAULT_REFRESH_PATH, DEFAULT_TIMEOUT_SECS,
};

/// Where the refresh credential is kept.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Refresh token stored locally and sent in the JSON body.
    #[default]
    Body,
    /// Refresh token held in an HTTP-only cookie.
    Cookie,
}

/// Token storage backend.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    File,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub refresh_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            refresh_path: DEFAULT_REFRESH_PATH.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: RefreshMode,
    /// Cookie name checked in cookie mode.
    pub refresh_cookie: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::Body,
            refresh_cookie: DEFAULT_REFRESH_COOKIE.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Token file path; defaults to `<config root>/tokenflow/tokens.json`.
    pub path: Option<String>,
    /// Encrypt the token file at rest.
    pub encrypt: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::File,
            path: None,
            encrypt: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Outcome of `tokenflow init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigInitResult {
    Created { path: std::path::PathBuf },
    AlreadyInitialized { path: std::path::PathBuf },
}
