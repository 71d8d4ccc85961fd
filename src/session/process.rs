//! Watched session process.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::events::spawn_line_pump;
use super::{stop_requested, ExecEvent, ForceStop, TreeKiller};
use crate::error::ExecError;
use crate::output::{OutputOrigin, ShellOutput};

/// Session stdin shared between writers and the watcher. `None` once closed.
pub(crate) type SharedStdin = Arc<Mutex<Option<ChildStdin>>>;

/// A spawned, watched session process.
pub(crate) struct SessionProcess {
    pub stdin: SharedStdin,
    pub force_stop: ForceStop,
    pub events: UnboundedReceiver<ExecEvent>,
    pub tx: UnboundedSender<ExecEvent>,
}

/// Take ownership of `child`, emit `Started`, and start the pipe readers and
/// the exit watcher.
///
/// The returned `tx` lets callers inject events (echoed writes) into the
/// same ordered stream.
pub(crate) fn spawn_session_process(
    mut child: Child,
    tag: &str,
    command: &str,
    interruptible: bool,
    killer: Option<Arc<dyn TreeKiller>>,
) -> Result<SessionProcess, ExecError> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ExecError::ProcessAcquisition("session stdin is not piped".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::ProcessAcquisition("session stdout is not piped".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::ProcessAcquisition("session stderr is not piped".into()))?;

    let (tx, events) = unbounded_channel();
    let (force_stop, stop_rx) = ForceStop::new(tag, killer);
    let _ = tx.send(ExecEvent::Started {
        tag: tag.to_string(),
        command: command.to_string(),
        force_stop: interruptible.then(|| force_stop.clone()),
    });

    let pumps = vec![
        spawn_line_pump(stdout, OutputOrigin::Stdout, tx.clone()),
        spawn_line_pump(stderr, OutputOrigin::Stderr, tx.clone()),
    ];
    let stdin: SharedStdin = Arc::new(Mutex::new(Some(stdin)));
    tokio::spawn(watch_process(
        child,
        stdin.clone(),
        pumps,
        stop_rx,
        tx.clone(),
        tag.to_string(),
    ));
    tracing::debug!(tag, interruptible, "session process started");

    Ok(SessionProcess {
        stdin,
        force_stop,
        events,
        tx,
    })
}

async fn watch_process(
    mut child: Child,
    stdin: SharedStdin,
    pumps: Vec<JoinHandle<()>>,
    mut stop_rx: watch::Receiver<bool>,
    tx: UnboundedSender<ExecEvent>,
    tag: String,
) {
    let aborts: Vec<_> = pumps.iter().map(JoinHandle::abort_handle).collect();
    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_requested(&mut stop_rx) => {
            drop(stdin.lock().await.take());
            aborts.iter().for_each(|pump| pump.abort());
            if let Err(err) = child.start_kill() {
                tracing::warn!(tag = %tag, error = %err, "failed to kill session process");
            }
            child.wait().await
        }
    };

    // Background children may hold the pipes open past the shell's exit.
    let drained = async {
        for pump in pumps {
            let _ = pump.await;
        }
    };
    tokio::select! {
        _ = drained => {}
        _ = stop_requested(&mut stop_rx) => {
            aborts.iter().for_each(|pump| pump.abort());
        }
    }

    // Taking stdin under its lock orders every echoed write before `Exited`.
    drop(stdin.lock().await.take());
    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            tracing::warn!(tag = %tag, error = %err, "failed to read session exit status");
            None
        }
    };
    tracing::debug!(tag = %tag, ?code, "session process exited");
    let _ = tx.send(ExecEvent::Exited { code });
}

/// Write `bytes` to the session stdin and flush.
pub(crate) async fn write_input(stdin: &SharedStdin, bytes: &[u8]) -> Result<(), ExecError> {
    let mut guard = stdin.lock().await;
    let pipe = guard
        .as_mut()
        .ok_or_else(|| ExecError::Stream("session input is closed".into()))?;
    pipe.write_all(bytes)
        .await
        .map_err(|e| ExecError::stream("write session input", e))?;
    pipe.flush()
        .await
        .map_err(|e| ExecError::stream("flush session input", e))
}

/// Write a command and echo it into the event stream while holding the
/// stdin lock.
pub(crate) async fn write_echoed(
    stdin: &SharedStdin,
    tx: &UnboundedSender<ExecEvent>,
    cmd: &str,
) -> Result<(), ExecError> {
    let mut guard = stdin.lock().await;
    let pipe = guard
        .as_mut()
        .ok_or_else(|| ExecError::Stream("session input is closed".into()))?;
    let mut line = cmd.trim_end_matches('\n').to_string();
    line.push('\n');
    pipe.write_all(line.as_bytes())
        .await
        .map_err(|e| ExecError::stream("write session input", e))?;
    pipe.flush()
        .await
        .map_err(|e| ExecError::stream("flush session input", e))?;
    let echoed = cmd.trim();
    if !echoed.is_empty() {
        let _ = tx.send(ExecEvent::Output(ShellOutput::text(OutputOrigin::Input, echoed)));
    }
    Ok(())
}

/// Close the session stdin. Closing an already closed input is a no-op.
pub(crate) async fn close_input(stdin: &SharedStdin) {
    if let Some(mut pipe) = stdin.lock().await.take() {
        if let Err(err) = pipe.shutdown().await {
            tracing::warn!(error = %err, "failed to close session input");
        }
    }
}
