//! Script execution engine.
//!
//! [`ScriptEngine`] owns the one-time environment preparation, the script
//! materializer, the kept shell behind the synchronous API, and spawns live
//! sessions. Clones share all state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::environment::{prepare_environment, EnvironmentSettings, ScriptEnvironment};
use crate::error::ExecError;
use crate::host::{AssetStore, DirAssets, DirSandbox, LocalShellLauncher, Sandbox, ShellLauncher};
use crate::keep_shell::KeepShell;
use crate::materialize::{strip_asset_scheme, ScriptMaterializer, ASSET_SCHEME};
use crate::output::{classify_output, joined_text, OutputOrigin, OutputTranslator, ShellOutput};
use crate::session::preamble::{
    build_preamble, build_session_input, export_line, invocation_line, shell_quote, PageExports,
};
use crate::session::process::{spawn_session_process, write_input, SessionProcess};
use crate::session::{InteractiveShell, ScriptRun, ShellSession, TreeKiller};

/// Engine inputs derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub environment: EnvironmentSettings,
    /// Interpreter written into the shebang of cached inline scripts.
    pub shebang: String,
    /// Pause between the preamble and the invocation.
    pub start_delay: Duration,
    /// Optional bound on one synchronous command; `None` waits for it to end.
    pub command_timeout: Option<Duration>,
    /// `@string` translation table for synchronous output.
    pub strings: BTreeMap<String, String>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            environment: EnvironmentSettings {
                executor: config.environment.executor.clone(),
                toolkit_dir: config.environment.toolkit_dir.clone(),
                temp_dir: config.paths.cache_dir.clone(),
                sdcard_path: config.environment.sdcard_path.clone(),
                android_sdk: config.environment.android_sdk,
            },
            shebang: config.environment.shebang.clone(),
            start_delay: config.shell.start_delay(),
            command_timeout: config.shell.command_timeout(),
            strings: config.strings.clone(),
        }
    }
}

/// Page whose configuration file a script belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub config_dir: String,
    /// Page config path; may carry the asset scheme.
    pub config_file: String,
}

/// One live execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    /// Inline script text or an asset reference.
    pub script: String,
    /// Extra variables exported before the invocation.
    pub params: BTreeMap<String, String>,
    pub page: Option<PageContext>,
    /// Whether the caller is handed a force-stop.
    pub interruptible: bool,
}

impl ExecRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }
}

/// Shell command that kills every process started under `tag`.
pub fn kill_tree_command(tag: &str) -> String {
    format!("shell_progres={} killtree", shell_quote(tag))
}

/// Shared execution engine.
#[derive(Clone)]
pub struct ScriptEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    launcher: Arc<dyn ShellLauncher>,
    sandbox: Arc<dyn Sandbox>,
    assets: Arc<dyn AssetStore>,
    materializer: ScriptMaterializer,
    translator: OutputTranslator,
    settings: EngineSettings,
    prepared: Mutex<Option<Arc<Prepared>>>,
    initialized: AtomicBool,
}

struct Prepared {
    environment: ScriptEnvironment,
    shell: KeepShell,
}

impl ScriptEngine {
    pub fn new(
        launcher: Arc<dyn ShellLauncher>,
        sandbox: Arc<dyn Sandbox>,
        assets: Arc<dyn AssetStore>,
        settings: EngineSettings,
    ) -> Self {
        let materializer =
            ScriptMaterializer::new(sandbox.clone(), assets.clone(), settings.shebang.clone());
        let translator = OutputTranslator::new(settings.strings.clone());
        Self {
            inner: Arc::new(EngineInner {
                launcher,
                sandbox,
                assets,
                materializer,
                translator,
                settings,
                prepared: Mutex::new(None),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Engine over local directories and the configured shell programs.
    pub fn from_config(config: &Config) -> Self {
        let sandbox: Arc<dyn Sandbox> = Arc::new(DirSandbox::new(config.paths.data_dir.clone()));
        let assets: Arc<dyn AssetStore> =
            Arc::new(DirAssets::new(config.paths.assets_dir.clone(), sandbox.clone()));
        let launcher: Arc<dyn ShellLauncher> =
            Arc::new(LocalShellLauncher::from_config(&config.shell));
        Self::new(launcher, sandbox, assets, EngineSettings::from_config(config))
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Prepare the environment once. Later calls return the cached result
    /// without touching the host; a failed attempt leaves the engine
    /// uninitialized so the next call tries again.
    pub async fn ensure_initialized(&self) -> Result<ScriptEnvironment, ExecError> {
        Ok(self.prepared().await?.environment.clone())
    }

    /// Forget the prepared environment and close the kept shell.
    pub async fn reset(&self) {
        let previous = self.inner.prepared.lock().await.take();
        self.inner.initialized.store(false, Ordering::Release);
        if let Some(prepared) = previous {
            prepared.shell.try_exit().await;
            tracing::debug!("script engine reset");
        }
    }

    async fn prepared(&self) -> Result<Arc<Prepared>, ExecError> {
        let mut guard = self.inner.prepared.lock().await;
        if let Some(prepared) = guard.as_ref() {
            return Ok(prepared.clone());
        }
        let rooted = self.inner.launcher.has_root().await;
        let environment = prepare_environment(
            &self.inner.settings.environment,
            self.inner.sandbox.as_ref(),
            self.inner.assets.as_ref(),
            rooted,
        )
        .inspect_err(|err| tracing::error!(error = %err, "environment initialization failed"))?;
        let shell = KeepShell::new(
            self.inner.launcher.clone(),
            rooted,
            self.inner.settings.command_timeout,
        );
        let prepared = Arc::new(Prepared { environment, shell });
        *guard = Some(prepared.clone());
        self.inner.initialized.store(true, Ordering::Release);
        Ok(prepared)
    }

    /// Run `script` in the kept shell and classify its whole stdout.
    ///
    /// Text rows go through the `@string` translation table. An empty script
    /// yields no outputs.
    pub async fn execute_outputs(
        &self,
        script: &str,
        page: Option<&PageContext>,
    ) -> Result<Vec<ShellOutput>, ExecError> {
        if script.is_empty() {
            return Ok(Vec::new());
        }
        let prepared = self.prepared().await?;
        let path = self.inner.materializer.materialize(script)?;

        let mut command = String::from("\n");
        command.push_str(&build_preamble(&self.page_exports(page), &BTreeMap::new()));
        command.push_str("\n\n");
        command.push_str(&invocation_line(
            &prepared.environment.executor_path().display().to_string(),
            &path.display().to_string(),
            None,
        ));

        let raw = prepared.shell.do_cmd(&command).await?;
        let mut outputs = classify_output(Some(&raw), OutputOrigin::Stdout);
        self.inner.translator.translate_all(&mut outputs);
        Ok(outputs)
    }

    /// [`Self::execute_outputs`] reduced to its joined text.
    pub async fn execute_text(
        &self,
        script: &str,
        page: Option<&PageContext>,
    ) -> Result<String, ExecError> {
        Ok(joined_text(&self.execute_outputs(script, page).await?))
    }

    /// Start `request` in a fresh shell process bound to `session`.
    ///
    /// Returns `Ok(None)` without side effects when the session has already
    /// run. Failures before the process exists give the session back; a
    /// failed preamble write force-stops the process.
    pub async fn execute(
        &self,
        session: &ShellSession,
        request: ExecRequest,
    ) -> Result<Option<ScriptRun>, ExecError> {
        if !session.try_start() {
            tracing::debug!(tag = session.tag(), "session already started; ignoring execute");
            return Ok(None);
        }
        let (process, input) = match self.launch(session, &request).await {
            Ok(launched) => launched,
            Err(err) => {
                session.release();
                tracing::warn!(tag = session.tag(), error = %err, "failed to launch session");
                return Err(err);
            }
        };
        if let Err(err) = write_input(&process.stdin, input.as_bytes()).await {
            tracing::warn!(tag = session.tag(), error = %err, "session preamble write failed");
            process.force_stop.invoke();
            return Err(err);
        }
        Ok(Some(ScriptRun::new(
            session.tag(),
            request.interruptible,
            process,
        )))
    }

    async fn launch(
        &self,
        session: &ShellSession,
        request: &ExecRequest,
    ) -> Result<(SessionProcess, String), ExecError> {
        let prepared = self.prepared().await?;
        let script = self.inner.materializer.materialize(&request.script)?;
        let preamble = build_preamble(&self.page_exports(request.page.as_ref()), &request.params);
        let invocation = invocation_line(
            &prepared.environment.executor_path().display().to_string(),
            &script.display().to_string(),
            Some(session.tag()),
        );
        let input = build_session_input(&preamble, self.inner.settings.start_delay, &invocation);

        let child = self
            .inner
            .launcher
            .spawn_shell(prepared.environment.rooted())?;
        let killer: Arc<dyn TreeKiller> = Arc::new(self.clone());
        let process = spawn_session_process(
            child,
            session.tag(),
            &request.script,
            request.interruptible,
            Some(killer),
        )?;
        Ok((process, input))
    }

    /// Open a shell the caller keeps writing commands into. The environment
    /// variables are exported first.
    pub async fn open_interactive(
        &self,
        session: &ShellSession,
    ) -> Result<Option<InteractiveShell>, ExecError> {
        if !session.try_start() {
            return Ok(None);
        }
        let launched = async {
            let prepared = self.prepared().await?;
            let child = self
                .inner
                .launcher
                .spawn_shell(prepared.environment.rooted())?;
            let killer: Arc<dyn TreeKiller> = Arc::new(self.clone());
            let process = spawn_session_process(child, session.tag(), "", true, Some(killer))?;
            Ok::<_, ExecError>((prepared, process))
        }
        .await;
        let (prepared, process) = match launched {
            Ok(launched) => launched,
            Err(err) => {
                session.release();
                return Err(err);
            }
        };

        let exports: String = prepared
            .environment
            .variables()
            .iter()
            .map(|(key, value)| format!("{}\n", export_line(key, value)))
            .collect();
        if let Err(err) = write_input(&process.stdin, exports.as_bytes()).await {
            process.force_stop.invoke();
            return Err(err);
        }
        Ok(Some(InteractiveShell::new(session.tag(), process)))
    }

    /// `PAGE_*` exports for `page`. Work paths point at the extracted copy
    /// when the page config is an asset.
    fn page_exports(&self, page: Option<&PageContext>) -> PageExports {
        let Some(page) = page.filter(|page| !page.config_file.is_empty()) else {
            return PageExports::default();
        };
        let (work_dir, work_file) = if page.config_file.starts_with(ASSET_SCHEME) {
            let assets = &self.inner.assets;
            (
                assets
                    .extract_path(strip_asset_scheme(&page.config_dir))
                    .display()
                    .to_string(),
                assets
                    .extract_path(strip_asset_scheme(&page.config_file))
                    .display()
                    .to_string(),
            )
        } else {
            (page.config_dir.clone(), page.config_file.clone())
        };
        PageExports {
            config_dir: page.config_dir.clone(),
            config_file: page.config_file.clone(),
            work_dir,
            work_file,
        }
    }
}

#[async_trait]
impl TreeKiller for ScriptEngine {
    async fn kill_tree(&self, tag: &str) {
        match self.execute_text(&kill_tree_command(tag), None).await {
            Ok(output) => tracing::debug!(tag, output = %output, "killed session tree"),
            Err(err) => tracing::warn!(tag, error = %err, "failed to kill session tree"),
        }
    }
}
