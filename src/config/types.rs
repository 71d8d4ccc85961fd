//! Configuration data model.
//!
//! Every section deserializes with `#[serde(default)]`, so an empty file (or no
//! file at all) yields the built-in defaults.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    default_assets_dir, default_cache_dir, default_data_dir, DEFAULT_ANDROID_SDK,
    DEFAULT_EXECUTOR, DEFAULT_PRIVILEGED_SHELL, DEFAULT_SDCARD_PATH,
    DEFAULT_SHEBANG, DEFAULT_START_DELAY_MS, DEFAULT_TOOLKIT_DIR, DEFAULT_UNPRIVILEGED_SHELL,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub environment: EnvironmentConfig,
    pub paths: PathsConfig,
    pub shell: ShellConfig,
    /// Translation table for `@string:<name>` output rows.
    pub strings: BTreeMap<String, String>,
}

/// Inputs to the wrapper template and its environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Wrapper template asset name (an asset-scheme prefix is accepted).
    pub executor: String,
    /// Toolkit asset directory; empty disables toolkit extraction.
    pub toolkit_dir: String,
    pub shebang: String,
    pub sdcard_path: String,
    pub android_sdk: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            executor: DEFAULT_EXECUTOR.to_string(),
            toolkit_dir: DEFAULT_TOOLKIT_DIR.to_string(),
            shebang: DEFAULT_SHEBANG.to_string(),
            sdcard_path: DEFAULT_SDCARD_PATH.to_string(),
            android_sdk: DEFAULT_ANDROID_SDK,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding bundled assets (wrapper template, toolkit, scripts).
    pub assets_dir: PathBuf,
    /// Private sandbox root; exported as `START_DIR`.
    pub data_dir: PathBuf,
    /// Scratch directory; exported as `TEMP_DIR`.
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Shell acquisition and session-input settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Program started for elevated sessions.
    pub privileged: String,
    /// Program started when root is unavailable.
    pub unprivileged: String,
    /// Skip root detection and force the answer.
    pub assume_root: Option<bool>,
    pub start_delay_ms: u64,
    /// Optional bound on one synchronous command; unset waits for the script.
    pub command_timeout_secs: Option<u64>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            privileged: DEFAULT_PRIVILEGED_SHELL.to_string(),
            unprivileged: DEFAULT_UNPRIVILEGED_SHELL.to_string(),
            assume_root: None,
            start_delay_ms: DEFAULT_START_DELAY_MS,
            command_timeout_secs: None,
        }
    }
}

impl ShellConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Kept-shell exchange timeout, never shorter than one second when set.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .map(|secs| Duration::from_secs(secs.max(1)))
    }
}
