//! Environment variable overrides applied after file parsing.

use std::path::PathBuf;

use crate::error::ConfigError;

use super::Config;

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(dir) = non_empty(env_lookup, "KREXEC_ASSETS_DIR") {
        config.paths.assets_dir = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty(env_lookup, "KREXEC_DATA_DIR") {
        config.paths.data_dir = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty(env_lookup, "KREXEC_CACHE_DIR") {
        config.paths.cache_dir = PathBuf::from(dir);
    }
    if let Some(path) = non_empty(env_lookup, "KREXEC_SDCARD_PATH") {
        config.environment.sdcard_path = path;
    }
    if let Some(sdk) = non_empty(env_lookup, "KREXEC_ANDROID_SDK") {
        config.environment.android_sdk = sdk.trim().parse::<u32>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid KREXEC_ANDROID_SDK value `{sdk}`: expected a non-negative integer"
            ))
        })?;
    }
    if let Some(program) = non_empty(env_lookup, "KREXEC_SU") {
        config.shell.privileged = program;
    }
    if let Some(program) = non_empty(env_lookup, "KREXEC_SH") {
        config.shell.unprivileged = program;
    }
    Ok(())
}

/// Blank values count as unset.
fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name).filter(|value| !value.trim().is_empty())
}
