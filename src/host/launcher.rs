//! Local shell launcher backed by `tokio::process`.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

use super::ShellLauncher;
use crate::config::ShellConfig;
use crate::error::ExecError;
use crate::keep_shell::KeepShell;

/// Bound on the root probe; a `su` waiting on a prompt reads as "no root".
const ROOT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches the configured privileged/unprivileged shell programs.
#[derive(Debug, Clone)]
pub struct LocalShellLauncher {
    privileged: String,
    unprivileged: String,
    assume_root: Option<bool>,
}

impl LocalShellLauncher {
    pub fn new(privileged: impl Into<String>, unprivileged: impl Into<String>) -> Self {
        Self {
            privileged: privileged.into(),
            unprivileged: unprivileged.into(),
            assume_root: None,
        }
    }

    pub fn from_config(shell: &ShellConfig) -> Self {
        Self {
            assume_root: shell.assume_root,
            ..Self::new(shell.privileged.clone(), shell.unprivileged.clone())
        }
    }

    /// Skip probing and report `assume_root` from [`ShellLauncher::has_root`].
    pub fn with_assume_root(mut self, assume_root: Option<bool>) -> Self {
        self.assume_root = assume_root;
        self
    }

    pub fn program(&self, privileged: bool) -> &str {
        if privileged {
            &self.privileged
        } else {
            &self.unprivileged
        }
    }
}

#[async_trait]
impl ShellLauncher for LocalShellLauncher {
    async fn has_root(&self) -> bool {
        if let Some(rooted) = self.assume_root {
            return rooted;
        }
        // Probe through a throwaway privileged shell; a missing `su` simply
        // fails to spawn and reads as "no root".
        let probe = KeepShell::new(Arc::new(self.clone()), true, Some(ROOT_PROBE_TIMEOUT));
        let rooted = probe.check_root().await;
        probe.try_exit().await;
        tracing::info!(rooted, program = %self.privileged, "probed root availability");
        rooted
    }

    fn spawn_shell(&self, privileged: bool) -> Result<Child, ExecError> {
        let program = self.program(privileged);
        let mut cmd = Command::new(program);
        cmd.kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timed-out exchange can take the whole tree down.
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd
            .spawn()
            .map_err(|e| ExecError::ProcessAcquisition(format!("{program}: {e}")))?;
        tracing::debug!(program, privileged, pid = ?child.id(), "spawned shell");
        Ok(child)
    }
}
