//! Directory-backed private sandbox.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::Sandbox;

/// Sandbox rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirSandbox {
    root: PathBuf,
}

impl DirSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Sandbox for DirSandbox {
    fn root(&self) -> &Path {
        &self.root
    }

    fn write_private(&self, relative: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        validate_relative(relative)?;
        let path = self.private_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write a sibling temp file, then rename over the target so a failed
        // write never leaves a truncated script behind.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!(".{file_name}.{:08x}.tmp", rand::random::<u32>()));
        if let Err(err) = write_executable(&tmp_path, bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        fs::rename(&tmp_path, &path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp_path);
        })?;
        tracing::trace!(path = %path.display(), bytes = bytes.len(), "wrote private file");
        Ok(path)
    }
}

fn write_executable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Reject names that would escape the sandbox root.
fn validate_relative(relative: &str) -> io::Result<()> {
    let trimmed = relative.trim_start_matches('/');
    let escapes = Path::new(trimmed)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if trimmed.is_empty() || escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("`{relative}` is not a path inside the sandbox"),
        ));
    }
    Ok(())
}
