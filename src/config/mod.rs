//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`KREXEC_ASSETS_DIR`, `KREXEC_DATA_DIR`,
//!    `KREXEC_CACHE_DIR`, `KREXEC_SDCARD_PATH`, `KREXEC_ANDROID_SDK`,
//!    `KREXEC_SU`, `KREXEC_SH`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./krexec.toml in the current directory
//! 4. $XDG_CONFIG_HOME/krexec/krexec.toml (or ~/.config/krexec/krexec.toml)
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

mod defaults;
mod env;
mod sources;
mod types;

use env::apply_runtime_env_overrides;
use sources::read_config_text_with_sources;
pub use types::{Config, EnvironmentConfig, PathsConfig, ShellConfig};

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        dirs::config_dir,
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
    let (config_text, source) =
        read_config_text_with_sources(path_override, &read_file, &config_root)?;
    tracing::debug!(?source, "loaded configuration source");
    let mut config: Config = toml::from_str(&config_text)?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    fn files(entries: &[(&str, &str)]) -> HashMap<PathBuf, String> {
        entries
            .iter()
            .map(|(path, text)| (PathBuf::from(path), text.to_string()))
            .collect()
    }

    fn load_with(
        path_override: Option<&str>,
        files: &HashMap<PathBuf, String>,
        env: &[(&str, &str)],
    ) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from_sources(
            path_override,
            |path| {
                files
                    .get(path)
                    .cloned()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
            },
            |name| env.get(name).cloned(),
            || Some(PathBuf::from("/home/u/.config")),
        )
    }

    #[test]
    fn no_files_yield_defaults() {
        let config = load_with(None, &HashMap::new(), &[]).unwrap();
        assert_eq!(config.environment, EnvironmentConfig::default());
        assert_eq!(config.shell, ShellConfig::default());
        assert!(config.strings.is_empty());
    }

    #[test]
    fn local_file_wins_over_global() {
        let files = files(&[
            ("krexec.toml", "[environment]\nandroid_sdk = 33\n"),
            (
                "/home/u/.config/krexec/krexec.toml",
                "[environment]\nandroid_sdk = 21\n",
            ),
        ]);
        let config = load_with(None, &files, &[]).unwrap();
        assert_eq!(config.environment.android_sdk, 33);
    }

    #[test]
    fn global_file_used_when_no_local_file() {
        let files = files(&[(
            "/home/u/.config/krexec/krexec.toml",
            "[shell]\nprivileged = \"sudo\"\n",
        )]);
        let config = load_with(None, &files, &[]).unwrap();
        assert_eq!(config.shell.privileged, "sudo");
        assert_eq!(config.shell.unprivileged, "sh");
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_with(Some("/nope.toml"), &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "got: {err}");
    }

    #[test]
    fn strings_table_and_paths_parse() {
        let files = files(&[(
            "custom.toml",
            "[paths]\nassets_dir = \"/opt/assets\"\n\n[strings]\nhello = \"Hello!\"\n",
        )]);
        let config = load_with(Some("custom.toml"), &files, &[]).unwrap();
        assert_eq!(config.paths.assets_dir, PathBuf::from("/opt/assets"));
        assert_eq!(config.strings.get("hello").map(String::as_str), Some("Hello!"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let files = files(&[("krexec.toml", "[shell]\nunprivileged = \"bash\"\n")]);
        let config = load_with(
            None,
            &files,
            &[
                ("KREXEC_SH", "dash"),
                ("KREXEC_ANDROID_SDK", "34"),
                ("KREXEC_DATA_DIR", "/data/x"),
                ("KREXEC_SU", "  "),
            ],
        )
        .unwrap();
        assert_eq!(config.shell.unprivileged, "dash");
        assert_eq!(config.shell.privileged, "su");
        assert_eq!(config.environment.android_sdk, 34);
        assert_eq!(config.paths.data_dir, PathBuf::from("/data/x"));
    }

    #[test]
    fn invalid_sdk_env_is_rejected() {
        let err = load_with(None, &HashMap::new(), &[("KREXEC_ANDROID_SDK", "tiramisu")])
            .unwrap_err();
        assert!(err.to_string().contains("KREXEC_ANDROID_SDK"), "got: {err}");
    }

    #[test]
    fn command_timeout_is_opt_in_and_at_least_one_second() {
        assert_eq!(ShellConfig::default().command_timeout(), None);
        let shell = ShellConfig {
            command_timeout_secs: Some(0),
            ..ShellConfig::default()
        };
        assert_eq!(
            shell.command_timeout(),
            Some(std::time::Duration::from_secs(1))
        );
        assert_eq!(
            ShellConfig::default().start_delay(),
            std::time::Duration::from_millis(200)
        );
    }
}
