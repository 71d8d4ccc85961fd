//! Session lifecycle: single-use session handles, force-stop, the watched
//! process, and the stdin payload written ahead of each invocation.

mod events;
pub mod preamble;
pub(crate) mod process;
mod run;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::watch;

pub use events::{EventSink, ExecEvent};
pub use run::{InteractiveShell, RunOutcome, ScriptRun, ShellInput};

/// Prefix of generated session tags.
pub const SESSION_TAG_PREFIX: &str = "pio_";

/// A new tag of the form `pio_<millis>_<hex>`.
pub fn generate_session_tag() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{SESSION_TAG_PREFIX}{millis}_{:04x}", rand::random::<u16>())
}

/// Execution context that accepts at most one execution.
#[derive(Debug)]
pub struct ShellSession {
    tag: String,
    started: AtomicBool,
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellSession {
    pub fn new() -> Self {
        Self::with_tag(generate_session_tag())
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            started: AtomicBool::new(false),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Claim the session. Only the first caller gets `true`.
    pub(crate) fn try_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give the claim back after a failure that left no process behind.
    pub(crate) fn release(&self) {
        self.started.store(false, Ordering::Release);
    }
}

/// Kills every process spawned under a session tag.
#[async_trait]
pub trait TreeKiller: Send + Sync {
    async fn kill_tree(&self, tag: &str);
}

/// Handle that terminates a session's process tree.
///
/// Invoking it runs the tree kill out of band, closes stdin, stops the pipe
/// readers, and kills the shell process. It returns without waiting for the
/// process to exit; the session still ends with an `Exited` event. Only the
/// first invocation has an effect, and invoking after exit is harmless.
#[derive(Clone)]
pub struct ForceStop {
    inner: Arc<ForceStopInner>,
}

struct ForceStopInner {
    tag: String,
    fired: AtomicBool,
    signal: watch::Sender<bool>,
    killer: Option<Arc<dyn TreeKiller>>,
    runtime: Handle,
}

impl fmt::Debug for ForceStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceStop")
            .field("tag", &self.inner.tag)
            .field("fired", &self.is_fired())
            .finish()
    }
}

impl ForceStop {
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(
        tag: &str,
        killer: Option<Arc<dyn TreeKiller>>,
    ) -> (Self, watch::Receiver<bool>) {
        let (signal, rx) = watch::channel(false);
        let stop = Self {
            inner: Arc::new(ForceStopInner {
                tag: tag.to_string(),
                fired: AtomicBool::new(false),
                signal,
                killer,
                runtime: Handle::current(),
            }),
        };
        (stop, rx)
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Request termination. Safe from any thread, any number of times.
    pub fn invoke(&self) {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            tracing::debug!(tag = %self.inner.tag, "force-stop already requested");
            return;
        }
        tracing::info!(tag = %self.inner.tag, "force-stopping session");
        if let Some(killer) = self.inner.killer.clone() {
            let tag = self.inner.tag.clone();
            self.inner.runtime.spawn(async move {
                killer.kill_tree(&tag).await;
            });
        }
        if self.inner.signal.send(true).is_err() {
            tracing::debug!(tag = %self.inner.tag, "session already exited");
        }
    }
}

/// Resolves once a stop has been requested. Never resolves if every
/// [`ForceStop`] handle is gone without firing.
pub(crate) async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
