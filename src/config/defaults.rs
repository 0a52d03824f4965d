//! Default configuration values.

/// Embedded `tokenflow.toml` written by `tokenflow init`.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../templates/tokenflow.toml");
/// Auth server root used when nothing is configured.
pub(super) const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
/// Refresh endpoint, relative to the base URL.
pub(super) const DEFAULT_REFRESH_PATH: &str = "/refresh-token";
/// Cookie carrying the refresh token in cookie mode.
pub(super) const DEFAULT_REFRESH_COOKIE: &str = "refreshToken";
/// Per-request timeout, refreshes included.
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Config file name looked up locally and under the config root.
pub(super) const CONFIG_FILE_NAME: &str = "tokenflow.toml";
/// Token file name under the config root.
pub(super) const TOKEN_FILE_NAME: &str = "tokens.json";
/// Directory under the config root that holds tokenflow files.
pub(super) const APP_DIR_NAME: &str = "tokenflow";
