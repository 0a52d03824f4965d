//! Configuration loading from TOML files and environment variables.
//!
//! Precedence (highest wins):
//! 1. `TOKENFLOW_BASE_URL`, `TOKENFLOW_REFRESH_PATH`, `TOKENFLOW_TIMEOUT_SECS`,
//!    `TOKENFLOW_STORAGE_PATH`
//! 2. TOML file given with `--config`
//! 3. `./tokenflow.toml`
//! 4. `$XDG_CONFIG_HOME/tokenflow/tokenflow.toml` (or `~/.config/...`)
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::debug;

use crate::error::ConfigError;

mod defaults;
mod env;
mod init;
mod sources;
mod types;

pub use init::{
    config_root_dir, default_global_config_path, default_token_store_path,
    initialize_default_global_config,
};
pub use types::{
    ApiConfig, Config, ConfigInitResult, NetworkConfig, RefreshMode, SessionConfig,
    StorageConfig, StorageKind,
};

use env::apply_env_overrides;
use sources::read_config_text_with_sources;

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from `--config`).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<Config, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text_with_sources(path_override, &read_file, &config_root)?;
    debug!(?source, "config source resolved");
    let mut config: Config = toml::from_str(&text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    normalize(&mut config)?;
    Ok(config)
}

impl Config {
    /// Absolute refresh endpoint: `refresh_path` resolved against `base_url`.
    pub fn refresh_url(&self) -> Result<Url, ConfigError> {
        join_url(&self.api.base_url, &self.api.refresh_path)
    }

    /// Token file location; `None` when no config root can be resolved.
    pub fn token_store_path(&self) -> Option<PathBuf> {
        self.storage
            .path
            .as_deref()
            .map(PathBuf::from)
            .or_else(default_token_store_path)
    }

    /// Replace `api.base_url` and re-run the same validation as file values.
    pub fn override_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        self.api.base_url = base_url.to_string();
        normalize(self)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.network.timeout_secs.max(1))
    }
}

fn normalize(config: &mut Config) -> Result<(), ConfigError> {
    let base = config.api.base_url.trim().trim_end_matches('/').to_string();
    let parsed = Url::parse(&base)
        .map_err(|e| ConfigError::Invalid(format!("api.base_url `{base}` is not a URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "api.base_url `{base}` must use http or https"
        )));
    }
    config.api.base_url = base;

    let refresh = config.api.refresh_path.trim();
    if refresh.is_empty() {
        return Err(ConfigError::Invalid("api.refresh_path must not be empty".to_string()));
    }
    config.api.refresh_path = refresh.to_string();

    let cookie = config.session.refresh_cookie.trim();
    if config.session.mode == RefreshMode::Cookie && cookie.is_empty() {
        return Err(ConfigError::Invalid(
            "session.refresh_cookie must name a cookie in cookie mode".to_string(),
        ));
    }
    config.session.refresh_cookie = cookie.to_string();

    config.network.timeout_secs = config.network.timeout_secs.max(1);
    config.storage.path = config
        .storage
        .path
        .take()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    Ok(())
}

fn join_url(base: &str, path: &str) -> Result<Url, ConfigError> {
    let joined = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    Url::parse(&joined)
        .map_err(|e| ConfigError::Invalid(format!("refresh URL `{joined}` is invalid: {e}")))
}
