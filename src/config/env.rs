//! Environment variable overrides.
//!
//! `TOKENFLOW_*` variables win over whatever the config file says.

use crate::error::ConfigError;

use super::Config;

pub(super) fn apply_env_overrides<FEnv>(config: &mut Config, env_lookup: &FEnv) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty(env_lookup, "TOKENFLOW_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(path) = non_empty(env_lookup, "TOKENFLOW_REFRESH_PATH") {
        config.api.refresh_path = path;
    }
    if let Some(path) = non_empty(env_lookup, "TOKENFLOW_STORAGE_PATH") {
        config.storage.path = Some(path);
    }
    if let Some(timeout) = non_empty(env_lookup, "TOKENFLOW_TIMEOUT_SECS") {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid TOKENFLOW_TIMEOUT_SECS value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        config.network.timeout_secs = parsed;
    }
    Ok(())
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
