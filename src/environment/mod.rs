//! Wrapper environment preparation.
//!
//! Preparing the environment extracts the toolkit, resolves the wrapper
//! template against the runtime variables, and writes the result into the
//! sandbox as an executable. The engine runs this once and reuses the result.

pub mod template;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ExecError;
use crate::host::{AssetStore, Sandbox};
use crate::materialize::strip_asset_scheme;
use template::{
    bind_executor_path, resolve_template, ANDROID_SDK, EXECUTOR_PATH, ROOT_PERMISSION,
    SDCARD_PATH, START_DIR, TEMP_DIR, TOOLKIT,
};

/// Inputs that do not depend on the host probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSettings {
    /// Wrapper template asset name.
    pub executor: String,
    /// Toolkit asset directory; empty skips extraction.
    pub toolkit_dir: String,
    pub temp_dir: PathBuf,
    pub sdcard_path: String,
    pub android_sdk: u32,
}

/// Resolved, written wrapper plus the variables it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEnvironment {
    executor_path: PathBuf,
    rooted: bool,
    variables: BTreeMap<String, String>,
}

impl ScriptEnvironment {
    /// Absolute path of the resolved wrapper.
    pub fn executor_path(&self) -> &Path {
        &self.executor_path
    }

    pub fn rooted(&self) -> bool {
        self.rooted
    }

    /// Template variables, including `EXECUTOR_PATH`.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}

/// Build the variable set substituted into the wrapper template.
pub fn environment_variables(
    toolkit: &str,
    start_dir: &Path,
    temp_dir: &Path,
    rooted: bool,
    sdcard_path: &str,
    android_sdk: u32,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TOOLKIT.to_string(), toolkit.to_string()),
        (START_DIR.to_string(), start_dir.display().to_string()),
        (TEMP_DIR.to_string(), temp_dir.display().to_string()),
        (ROOT_PERMISSION.to_string(), rooted.to_string()),
        (SDCARD_PATH.to_string(), sdcard_path.to_string()),
        (ANDROID_SDK.to_string(), android_sdk.to_string()),
    ])
}

/// Extract the toolkit, resolve the wrapper, and write it into the sandbox.
///
/// Nothing is reported as prepared unless the final write succeeds.
pub fn prepare_environment(
    settings: &EnvironmentSettings,
    sandbox: &dyn Sandbox,
    assets: &dyn AssetStore,
    rooted: bool,
) -> Result<ScriptEnvironment, ExecError> {
    let toolkit = if settings.toolkit_dir.is_empty() {
        String::new()
    } else {
        let name = strip_asset_scheme(&settings.toolkit_dir);
        assets
            .extract_tree(name)
            .map_err(|e| ExecError::init(&format!("extract toolkit `{name}`"), e))?
            .display()
            .to_string()
    };

    let executor = strip_asset_scheme(&settings.executor);
    let raw = assets
        .read(executor)
        .map_err(|e| ExecError::init(&format!("read wrapper template `{executor}`"), e))?;
    let template = String::from_utf8_lossy(&raw);

    let mut variables = environment_variables(
        &toolkit,
        sandbox.root(),
        &settings.temp_dir,
        rooted,
        &settings.sdcard_path,
        settings.android_sdk,
    );
    let resolved = resolve_template(&template, &variables);

    let executor_path = sandbox.private_path(executor);
    let executor_display = executor_path.display().to_string();
    let wrapper = bind_executor_path(&resolved, &executor_display);
    let written = sandbox
        .write_private(executor, wrapper.as_bytes())
        .map_err(|e| ExecError::init(&format!("write wrapper `{executor_display}`"), e))?;

    variables.insert(EXECUTOR_PATH.to_string(), written.display().to_string());
    tracing::info!(executor = %written.display(), rooted, toolkit = %toolkit, "script environment prepared");
    Ok(ScriptEnvironment {
        executor_path: written,
        rooted,
        variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DirAssets, DirSandbox};
    use crate::testsupport::TestTempDir;
    use std::fs;
    use std::sync::Arc;

    fn settings(dir: &TestTempDir, toolkit_dir: &str) -> EnvironmentSettings {
        EnvironmentSettings {
            executor: "file:///android_asset/kr-script/executor.sh".to_string(),
            toolkit_dir: toolkit_dir.to_string(),
            temp_dir: dir.child("cache"),
            sdcard_path: "/sdcard".to_string(),
            android_sdk: 30,
        }
    }

    fn collaborators(dir: &TestTempDir) -> (Arc<DirSandbox>, DirAssets) {
        let sandbox = Arc::new(DirSandbox::new(dir.child("files")));
        let assets = DirAssets::new(dir.child("assets"), sandbox.clone());
        (sandbox, assets)
    }

    #[test]
    fn variables_cover_the_fixed_vocabulary() {
        let vars = environment_variables("/k", Path::new("/s"), Path::new("/t"), false, "/sd", 33);
        assert_eq!(vars.len(), 6);
        assert_eq!(vars[ROOT_PERMISSION], "false");
        assert_eq!(vars[ANDROID_SDK], "33");
        assert_eq!(vars[START_DIR], "/s");
    }

    #[test]
    fn prepares_wrapper_with_all_values_bound() {
        let dir = TestTempDir::new("env-prepare");
        dir.write_text(
            "assets/kr-script/executor.sh",
            "#!/bin/sh\r\nkit=$({TOOLKIT})\nroot=$({ROOT_PERMISSION})\nself=$({EXECUTOR_PATH})\nkeep=$({UNKNOWN})\n",
        );
        dir.write_text("assets/kr-script/toolkit/tool.sh", "echo tool");
        let (sandbox, assets) = collaborators(&dir);

        let env = prepare_environment(
            &settings(&dir, "kr-script/toolkit"),
            sandbox.as_ref(),
            &assets,
            true,
        )
        .unwrap();

        let wrapper_path = dir.child("files/kr-script/executor.sh");
        assert_eq!(env.executor_path(), wrapper_path.as_path());
        assert!(env.rooted());
        let text = fs::read_to_string(&wrapper_path).unwrap();
        let kit = dir.child("files/kr-script/toolkit");
        assert_eq!(
            text,
            format!(
                "#!/bin/sh\nkit={}\nroot=true\nself={}\nkeep=$({{UNKNOWN}})\n",
                kit.display(),
                wrapper_path.display()
            )
        );
        assert!(kit.join("tool.sh").exists());
        assert_eq!(
            env.variables()[EXECUTOR_PATH],
            wrapper_path.display().to_string()
        );
    }

    #[test]
    fn empty_toolkit_dir_skips_extraction() {
        let dir = TestTempDir::new("env-no-toolkit");
        dir.write_text("assets/kr-script/executor.sh", "kit=[$({TOOLKIT})]");
        let (sandbox, assets) = collaborators(&dir);
        let env = prepare_environment(&settings(&dir, ""), sandbox.as_ref(), &assets, false).unwrap();
        assert_eq!(fs::read_to_string(env.executor_path()).unwrap(), "kit=[]");
    }

    #[test]
    fn missing_template_is_an_initialization_error() {
        let dir = TestTempDir::new("env-missing");
        let (sandbox, assets) = collaborators(&dir);
        let err = prepare_environment(&settings(&dir, ""), sandbox.as_ref(), &assets, false)
            .unwrap_err();
        assert!(matches!(err, ExecError::Initialization(_)), "got: {err}");
        assert!(!dir.child("files/kr-script/executor.sh").exists());
    }
}
