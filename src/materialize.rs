//! Script materialization: turn an asset reference or inline script text into
//! an executable path inside the sandbox.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::ExecError;
use crate::host::{AssetStore, Sandbox};

/// Prefix marking a bundled asset reference.
pub const ASSET_SCHEME: &str = "file:///android_asset/";

/// Sandbox directory holding content-addressed inline scripts.
pub const CACHE_DIR: &str = "kr-script/cache";

/// Bytes of the SHA-256 digest kept in the cache key.
const CONTENT_KEY_BYTES: usize = 16;

/// A script as the caller supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRef<'a> {
    /// Asset name with the scheme prefix removed.
    Asset(&'a str),
    Inline(&'a str),
}

impl<'a> ScriptRef<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.strip_prefix(ASSET_SCHEME) {
            Some(name) => Self::Asset(name),
            None => Self::Inline(raw),
        }
    }
}

/// Drop the asset scheme prefix if present.
pub fn strip_asset_scheme(name: &str) -> &str {
    name.strip_prefix(ASSET_SCHEME).unwrap_or(name)
}

/// Hex cache key for `script`: the first 128 bits of its SHA-256 digest.
pub fn content_key(script: &str) -> String {
    let digest = Sha256::digest(script.as_bytes());
    digest[..CONTENT_KEY_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Sandbox-relative cache path for `script`.
pub fn cache_path(script: &str) -> String {
    format!("{CACHE_DIR}/{}.sh", content_key(script))
}

/// Prepend the shebang and normalize `\r\n` and lone `\r` to `\n`.
pub fn normalize_script(shebang: &str, body: &str) -> String {
    format!("#!{shebang}\n\n{body}")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Resolves scripts to executable paths, caching inline text by content.
#[derive(Clone)]
pub struct ScriptMaterializer {
    sandbox: Arc<dyn Sandbox>,
    assets: Arc<dyn AssetStore>,
    shebang: String,
}

impl ScriptMaterializer {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        assets: Arc<dyn AssetStore>,
        shebang: impl Into<String>,
    ) -> Self {
        Self {
            sandbox,
            assets,
            shebang: shebang.into(),
        }
    }

    /// Return the absolute path of an executable file for `raw`.
    ///
    /// Cache hits are decided by existence alone; an existing file at the
    /// content path is used as is.
    pub fn materialize(&self, raw: &str) -> Result<PathBuf, ExecError> {
        match ScriptRef::parse(raw) {
            ScriptRef::Asset(name) => {
                let path = self
                    .assets
                    .extract_file(name)
                    .map_err(|e| ExecError::materialize(&format!("extract asset `{name}`"), e))?;
                tracing::debug!(asset = name, path = %path.display(), "extracted script asset");
                Ok(path)
            }
            ScriptRef::Inline(text) => {
                let relative = cache_path(text);
                if self.sandbox.exists(&relative) {
                    tracing::debug!(cache = %relative, "script cache hit");
                    return Ok(self.sandbox.private_path(&relative));
                }
                let body = normalize_script(&self.shebang, text);
                let path = self
                    .sandbox
                    .write_private(&relative, body.as_bytes())
                    .map_err(|e| ExecError::materialize(&format!("write `{relative}`"), e))?;
                tracing::debug!(cache = %relative, "script cache miss; written");
                Ok(path)
            }
        }
    }
}
