//! krexec: a script execution engine for privileged shells.
//!
//! Scripts (inline text or bundled assets) run through a templated wrapper
//! inside a shell process, and the process output comes back as typed events:
//! log lines tagged by stream, progress tuples, and image references.
//!
//! # Quick start
//!
//! ```no_run
//! use krexec::config::load_config;
//! use krexec::engine::{ExecRequest, ScriptEngine};
//! use krexec::session::ShellSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let engine = ScriptEngine::from_config(&config);
//! let session = ShellSession::new();
//! if let Some(run) = engine.execute(&session, ExecRequest::new("echo hello")).await? {
//!     let outcome = run.collect().await;
//!     println!("exit: {:?}", outcome.exit_code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod build_info;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod host;
pub mod keep_shell;
pub mod materialize;
pub mod output;
pub mod render;
pub mod session;
#[cfg(test)]
pub mod testsupport;
