//! Error types for the execution engine and its configuration.

use std::fmt;

// ---------------------------------------------------------------------------
// ExecError
// ---------------------------------------------------------------------------

/// Errors surfaced by environment setup, script materialization, and
/// session processes.
#[derive(Debug)]
pub enum ExecError {
    /// Wrapper template could not be read, resolved, or written. The engine
    /// stays uninitialized and the next call retries.
    Initialization(String),
    /// Script cache or asset extraction target could not be written.
    Materialization(String),
    /// No shell process could be spawned.
    ProcessAcquisition(String),
    /// Pipe read/write failure on a live session.
    Stream(String),
}

impl ExecError {
    pub(crate) fn init(context: &str, err: impl fmt::Display) -> Self {
        Self::Initialization(format!("{context}: {err}"))
    }

    pub(crate) fn materialize(context: &str, err: impl fmt::Display) -> Self {
        Self::Materialization(format!("{context}: {err}"))
    }

    pub(crate) fn stream(context: &str, err: impl fmt::Display) -> Self {
        Self::Stream(format!("{context}: {err}"))
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization(msg) => write!(f, "initialization failed: {msg}"),
            Self::Materialization(msg) => write!(f, "materialization failed: {msg}"),
            Self::ProcessAcquisition(msg) => write!(f, "failed to start shell process: {msg}"),
            Self::Stream(msg) => write!(f, "stream error: {msg}"),
        }
    }
}

impl std::error::Error for ExecError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}
