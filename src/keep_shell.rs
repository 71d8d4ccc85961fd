//! Long-lived shell used for synchronous command execution.
//!
//! Each command is framed between two echoed tags on stdout. Everything read
//! before the start tag (late output of a previous command, login banners) is
//! discarded, and the exchange ends at the end tag. One command runs at a
//! time and, unless a timeout is configured, runs until it finishes. A
//! timed-out exchange kills the shell's whole process group; a broken one
//! drops the shell. Either way the next call spawns a fresh one.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::ExecError;
use crate::host::{kill_process_group, ShellLauncher};

pub(crate) const START_TAG: &str = "|SH>>|";
pub(crate) const END_TAG: &str = "|<<SH|";

/// Prints `success` only when the shell runs as uid 0.
const ROOT_CHECK_SCRIPT: &str = "if [ \"$(id -u 2>&1)\" = '0' ]; then\n  echo 'success'\nelse\n  echo 'permission denied'\nfi";

/// Output fragments that mark a failed root check.
const ROOT_DENIED_MARKERS: [&str; 4] = ["error", "permission denied", "not allowed", "not found"];

/// Persistent shell with framed synchronous commands.
pub struct KeepShell {
    launcher: Arc<dyn ShellLauncher>,
    privileged: bool,
    command_timeout: Option<Duration>,
    process: Mutex<Option<KeptProcess>>,
}

struct KeptProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_drain: Option<JoinHandle<()>>,
}

impl Drop for KeptProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_drain.take() {
            task.abort();
        }
    }
}

impl KeepShell {
    pub fn new(
        launcher: Arc<dyn ShellLauncher>,
        privileged: bool,
        command_timeout: Option<Duration>,
    ) -> Self {
        Self {
            launcher,
            privileged,
            command_timeout,
            process: Mutex::new(None),
        }
    }

    /// Run `cmd` and return its trimmed stdout.
    pub async fn do_cmd(&self, cmd: &str) -> Result<String, ExecError> {
        let mut guard = self.process.lock().await;
        let mut process = match guard.take() {
            Some(process) => process,
            None => self.spawn()?,
        };
        let exchanged = match self.command_timeout {
            Some(limit) => timeout(limit, process.exchange(cmd)).await.ok(),
            None => Some(process.exchange(cmd).await),
        };
        match exchanged {
            Some(Ok(output)) => {
                *guard = Some(process);
                Ok(output)
            }
            // Dropping `process` kills the shell; the next call respawns.
            Some(Err(err)) => {
                tracing::warn!(error = %err, "kept shell exchange failed; discarding shell");
                Err(err)
            }
            None => {
                tracing::warn!(timeout = ?self.command_timeout, "kept shell command timed out; killing its process group");
                if let Some(pid) = process.child.id() {
                    kill_process_group(pid).await;
                }
                Err(ExecError::Stream(format!(
                    "command did not finish within {:?}",
                    self.command_timeout.unwrap_or_default()
                )))
            }
        }
    }

    /// Whether this shell runs with root privileges.
    pub async fn check_root(&self) -> bool {
        match self.do_cmd(ROOT_CHECK_SCRIPT).await {
            Ok(output) => interpret_root_check(&output),
            Err(err) => {
                tracing::debug!(error = %err, "root check failed");
                false
            }
        }
    }

    /// Tear down the running shell, if any.
    pub async fn try_exit(&self) {
        if self.process.lock().await.take().is_some() {
            tracing::debug!(privileged = self.privileged, "kept shell closed");
        }
    }

    fn spawn(&self) -> Result<KeptProcess, ExecError> {
        let mut child = self.launcher.spawn_shell(self.privileged)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecError::ProcessAcquisition("shell stdin is not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::ProcessAcquisition("shell stdout is not piped".into()))?;
        let stderr_drain = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "krexec::keep_shell", "{line}");
                }
            })
        });
        Ok(KeptProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_drain,
        })
    }
}

impl KeptProcess {
    async fn exchange(&mut self, cmd: &str) -> Result<String, ExecError> {
        let payload = format!("\necho '{START_TAG}'\n{cmd}\necho '{END_TAG}'\n");
        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| ExecError::stream("write to kept shell", e))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ExecError::stream("flush kept shell", e))?;

        let mut output = String::new();
        let mut reading = false;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = self
                .stdout
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| ExecError::stream("read kept shell", e))?;
            if read == 0 {
                return Err(ExecError::Stream("kept shell exited mid-command".into()));
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(idx) = line.find(START_TAG) {
                output.clear();
                output.push_str(&line[idx + START_TAG.len()..]);
                reading = true;
            } else if let Some(idx) = line.find(END_TAG) {
                output.push_str(&line[..idx]);
                break;
            } else if reading {
                output.push_str(line);
                output.push('\n');
            }
        }
        Ok(output.trim().to_string())
    }
}

/// Interpret root-check output: any denial marker wins over `success`.
pub(crate) fn interpret_root_check(output: &str) -> bool {
    let lower = output.to_lowercase();
    if ROOT_DENIED_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    lower.contains("success")
}
