//! Host collaborators consumed by the engine.
//!
//! The engine never touches the OS directly: shells come from a
//! [`ShellLauncher`], private files go through a [`Sandbox`], and bundled
//! files come from an [`AssetStore`]. Local implementations back each seam so
//! the engine runs on any Unix host.

mod assets;
mod launcher;
mod sandbox;

use crate::error::ExecError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Child;

pub use assets::DirAssets;
pub use launcher::LocalShellLauncher;
pub use sandbox::DirSandbox;

/// SIGKILL every process in group `pgid`. Shells from
/// [`LocalShellLauncher`] lead their own group, so this also reaps whatever
/// the shell started.
pub(crate) async fn kill_process_group(pgid: u32) {
    let target = format!("-{pgid}");
    match tokio::process::Command::new("kill")
        .args(["-9", "--", &target])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            tracing::debug!(pgid, "killed process group");
        }
        Ok(output) => tracing::debug!(
            pgid,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "process group already gone"
        ),
        Err(err) => tracing::warn!(pgid, error = %err, "failed to run kill"),
    }
}

/// Spawns interactive shells and reports root availability.
#[async_trait]
pub trait ShellLauncher: Send + Sync {
    /// Whether an elevated shell can be acquired on this host.
    async fn has_root(&self) -> bool;
    /// Spawn a shell with piped stdin/stdout/stderr.
    fn spawn_shell(&self, privileged: bool) -> Result<Child, ExecError>;
}

/// Private, app-owned file area.
pub trait Sandbox: Send + Sync {
    /// Absolute root of the sandbox.
    fn root(&self) -> &Path;
    /// Absolute path a relative sandbox name maps to.
    fn private_path(&self, relative: &str) -> PathBuf {
        self.root().join(relative.trim_start_matches('/'))
    }
    fn exists(&self, relative: &str) -> bool {
        self.private_path(relative).exists()
    }
    /// Write `bytes` to `relative` as an executable file and return its
    /// absolute path. Readers never observe a partially written file.
    fn write_private(&self, relative: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Read-only bundle of files shipped with the host application.
pub trait AssetStore: Send + Sync {
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
    /// Where `name` lands once extracted (whether or not it is yet).
    fn extract_path(&self, name: &str) -> PathBuf;
    /// Extract one file and return its absolute path.
    fn extract_file(&self, name: &str) -> io::Result<PathBuf>;
    /// Recursively extract a directory and return its absolute base path.
    fn extract_tree(&self, name: &str) -> io::Result<PathBuf>;
}
