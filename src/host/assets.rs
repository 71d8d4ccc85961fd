//! Directory-backed asset bundle extracted into a sandbox.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AssetStore, Sandbox};

/// Assets read from a local directory and extracted into `sandbox` under the
/// same relative names.
#[derive(Clone)]
pub struct DirAssets {
    source: PathBuf,
    sandbox: Arc<dyn Sandbox>,
}

impl DirAssets {
    pub fn new(source: impl Into<PathBuf>, sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            source: source.into(),
            sandbox,
        }
    }

    fn source_path(&self, name: &str) -> PathBuf {
        self.source.join(name.trim_start_matches('/'))
    }
}

impl AssetStore for DirAssets {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.source_path(name);
        fs::read(&path).map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))
    }

    fn extract_path(&self, name: &str) -> PathBuf {
        self.sandbox.private_path(name)
    }

    fn extract_file(&self, name: &str) -> io::Result<PathBuf> {
        let bytes = self.read(name)?;
        self.sandbox.write_private(name, &bytes)
    }

    fn extract_tree(&self, name: &str) -> io::Result<PathBuf> {
        let root = self.source_path(name);
        let mut copied = 0usize;
        copy_tree(&root, name.trim_end_matches('/'), self.sandbox.as_ref(), &mut copied)?;
        tracing::debug!(asset = name, files = copied, "extracted asset tree");
        Ok(self.extract_path(name))
    }
}

fn copy_tree(dir: &Path, prefix: &str, sandbox: &dyn Sandbox, copied: &mut usize) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let relative = format!("{prefix}/{}", file_name.to_string_lossy());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &relative, sandbox, copied)?;
        } else {
            sandbox.write_private(&relative, &fs::read(entry.path())?)?;
            *copied += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DirSandbox;
    use crate::testsupport::TestTempDir;

    fn store(dir: &TestTempDir) -> DirAssets {
        DirAssets::new(
            dir.child("assets"),
            Arc::new(DirSandbox::new(dir.child("files"))),
        )
    }

    #[test]
    fn extract_file_copies_into_sandbox() {
        let dir = TestTempDir::new("assets-file");
        dir.write_text("assets/scripts/hello.sh", "echo hello\n");
        let path = store(&dir).extract_file("scripts/hello.sh").unwrap();
        assert_eq!(path, dir.child("files/scripts/hello.sh"));
        assert_eq!(fs::read_to_string(path).unwrap(), "echo hello\n");
    }

    #[test]
    fn extract_tree_copies_nested_files() {
        let dir = TestTempDir::new("assets-tree");
        dir.write_text("assets/kit/busybox", "bin");
        dir.write_text("assets/kit/lib/util.sh", "util");
        let base = store(&dir).extract_tree("kit").unwrap();
        assert_eq!(base, dir.child("files/kit"));
        assert_eq!(fs::read_to_string(base.join("lib/util.sh")).unwrap(), "util");
        assert!(base.join("busybox").exists());
    }

    #[test]
    fn missing_asset_reports_path() {
        let dir = TestTempDir::new("assets-missing");
        let err = store(&dir).read("nope.sh").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("nope.sh"));
    }
}
