//! Live session events and the consumer seam they are delivered through.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::ForceStop;
use crate::output::{classify_line, OutputOrigin, ShellOutput};

/// One event of a live session, delivered in production order.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    /// First event of every session.
    Started {
        tag: String,
        /// Script as the caller supplied it.
        command: String,
        /// Present only for interruptible requests.
        force_stop: Option<ForceStop>,
    },
    Output(ShellOutput),
    /// Last event of every session. `None` when the process was killed by a
    /// signal or its status could not be read.
    Exited { code: Option<i32> },
}

/// Consumer of live session events.
pub trait EventSink: Send {
    fn on_event(&mut self, event: ExecEvent);
}

impl<F> EventSink for F
where
    F: FnMut(ExecEvent) + Send,
{
    fn on_event(&mut self, event: ExecEvent) {
        self(event)
    }
}

/// Read `reader` line by line, classify each line, and forward the result.
///
/// Each newline-terminated record is delivered as soon as it is read. A
/// dropped receiver does not stop the pump; the pipe keeps draining so the
/// process never blocks on a full buffer.
pub(crate) fn spawn_line_pump<R>(
    reader: R,
    origin: OutputOrigin,
    tx: UnboundedSender<ExecEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Some(output) = classify_line(&line, origin) {
                        let _ = tx.send(ExecEvent::Output(output));
                    }
                }
                Err(err) => {
                    tracing::warn!(?origin, error = %err, "session pipe read failed");
                    break;
                }
            }
        }
    })
}
