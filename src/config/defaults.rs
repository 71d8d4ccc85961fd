//! Default configuration constants.
//!
//! Paths default to per-user platform directories and fall back to the system
//! temp dir when the platform does not report one.

use std::path::PathBuf;

/// Local config file name searched in the working directory.
pub(super) const LOCAL_CONFIG_FILE: &str = "krexec.toml";
/// Application directory name under platform config/data/cache roots.
pub(super) const APP_DIR: &str = "krexec";
/// Bundled wrapper template (asset name).
pub(super) const DEFAULT_EXECUTOR: &str = "kr-script/executor.sh";
/// Bundled toolkit directory (asset name) extracted during init.
pub(super) const DEFAULT_TOOLKIT_DIR: &str = "kr-script/toolkit";
/// Interpreter line prepended to cached inline scripts.
pub(super) const DEFAULT_SHEBANG: &str = "/system/bin/sh";
pub(super) const DEFAULT_SDCARD_PATH: &str = "/sdcard";
pub(super) const DEFAULT_ANDROID_SDK: u32 = 30;
pub(super) const DEFAULT_PRIVILEGED_SHELL: &str = "su";
pub(super) const DEFAULT_UNPRIVILEGED_SHELL: &str = "sh";
/// Pause written before the invocation line so the shell settles.
pub(super) const DEFAULT_START_DELAY_MS: u64 = 200;

pub(super) fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

pub(super) fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("files")
}

pub(super) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
