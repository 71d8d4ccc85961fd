//! Caller-facing handles for live sessions.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::process::{close_input, write_echoed, SessionProcess, SharedStdin};
use super::{EventSink, ExecEvent, ForceStop};
use crate::error::ExecError;
use crate::output::ShellOutput;

/// Everything a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub outputs: Vec<ShellOutput>,
    pub exit_code: Option<i32>,
}

/// Event stream of one live script run.
#[derive(Debug)]
pub struct ScriptRun {
    tag: String,
    interruptible: bool,
    force_stop: ForceStop,
    events: UnboundedReceiver<ExecEvent>,
    finished: bool,
}

impl ScriptRun {
    pub(crate) fn new(tag: &str, interruptible: bool, process: SessionProcess) -> Self {
        Self {
            tag: tag.to_string(),
            interruptible,
            force_stop: process.force_stop,
            events: process.events,
            finished: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Force-stop handle, offered only for interruptible runs.
    pub fn force_stop(&self) -> Option<&ForceStop> {
        self.interruptible.then_some(&self.force_stop)
    }

    /// Next event, or `None` once `Exited` has been delivered.
    pub async fn next_event(&mut self) -> Option<ExecEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await;
        match event {
            Some(ExecEvent::Exited { .. }) | None => self.finished = true,
            Some(_) => {}
        }
        event
    }

    /// Feed every remaining event to `sink` and return the exit code.
    pub async fn drain_into(&mut self, sink: &mut dyn EventSink) -> Option<i32> {
        let mut exit_code = None;
        while let Some(event) = self.next_event().await {
            if let ExecEvent::Exited { code } = &event {
                exit_code = *code;
            }
            sink.on_event(event);
        }
        exit_code
    }

    /// Wait for the run to finish and collect its outputs.
    pub async fn collect(mut self) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        while let Some(event) = self.next_event().await {
            match event {
                ExecEvent::Output(output) => outcome.outputs.push(output),
                ExecEvent::Exited { code } => outcome.exit_code = code,
                ExecEvent::Started { .. } => {}
            }
        }
        outcome
    }
}

/// Writer half of an interactive session.
#[derive(Debug, Clone)]
pub struct ShellInput {
    stdin: SharedStdin,
    tx: UnboundedSender<ExecEvent>,
}

impl ShellInput {
    /// Write one command line and echo it as an `Input` text event.
    pub async fn write(&self, cmd: &str) -> Result<(), ExecError> {
        write_echoed(&self.stdin, &self.tx, cmd).await
    }

    /// Ask the shell to exit and close its input. The run then ends with
    /// `Exited` once the shell is gone.
    pub async fn finish(&self) -> Result<(), ExecError> {
        let result = write_echoed(&self.stdin, &self.tx, "exit").await;
        close_input(&self.stdin).await;
        result
    }
}

/// Long-lived session the caller keeps writing commands into.
#[derive(Debug)]
pub struct InteractiveShell {
    input: ShellInput,
    run: ScriptRun,
}

impl InteractiveShell {
    pub(crate) fn new(tag: &str, process: SessionProcess) -> Self {
        let input = ShellInput {
            stdin: process.stdin.clone(),
            tx: process.tx.clone(),
        };
        Self {
            input,
            run: ScriptRun::new(tag, true, process),
        }
    }

    pub fn tag(&self) -> &str {
        self.run.tag()
    }

    pub async fn write(&self, cmd: &str) -> Result<(), ExecError> {
        self.input.write(cmd).await
    }

    pub async fn finish(&self) -> Result<(), ExecError> {
        self.input.finish().await
    }

    pub fn force_stop(&self) -> &ForceStop {
        &self.run.force_stop
    }

    pub async fn next_event(&mut self) -> Option<ExecEvent> {
        self.run.next_event().await
    }

    /// Split into a writer and the event stream so both can be driven
    /// concurrently.
    pub fn into_parts(self) -> (ShellInput, ScriptRun) {
        (self.input, self.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LocalShellLauncher, ShellLauncher};
    use crate::output::OutputOrigin;
    use crate::session::process::{spawn_session_process, write_input};
    use std::time::Duration;
    use tokio::time::timeout;

    fn spawn_sh(tag: &str, interruptible: bool) -> SessionProcess {
        let child = LocalShellLauncher::new("sh", "sh").spawn_shell(false).unwrap();
        spawn_session_process(child, tag, "test", interruptible, None).unwrap()
    }

    #[tokio::test]
    async fn run_starts_streams_and_exits_in_order() {
        let process = spawn_sh("pio_t1", false);
        write_input(
            &process.stdin,
            b"echo out\necho 'progress:[1/2]'\necho @img:/i.png\nexit 3\n",
        )
        .await
        .unwrap();
        let mut run = ScriptRun::new("pio_t1", false, process);
        assert!(run.force_stop().is_none());

        let first = run.next_event().await.unwrap();
        assert!(
            matches!(&first, ExecEvent::Started { tag, force_stop: None, .. } if tag == "pio_t1"),
            "got: {first:?}"
        );
        let outcome = timeout(Duration::from_secs(5), run.collect()).await.unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(
            outcome.outputs,
            vec![
                ShellOutput::text(OutputOrigin::Stdout, "out"),
                ShellOutput::Progress { current: 1, total: 2 },
                ShellOutput::Image {
                    path: "/i.png".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn stderr_lines_carry_error_origin() {
        let process = spawn_sh("pio_t2", false);
        write_input(&process.stdin, b"echo bad >&2\nexit 0\n").await.unwrap();
        let outcome = ScriptRun::new("pio_t2", false, process).collect().await;
        assert_eq!(
            outcome.outputs,
            vec![ShellOutput::text(OutputOrigin::Stderr, "bad")]
        );
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn force_stop_ends_a_hung_session_and_is_repeatable() {
        let process = spawn_sh("pio_t3", true);
        write_input(&process.stdin, b"sleep 30\n").await.unwrap();
        let mut run = ScriptRun::new("pio_t3", true, process);
        let stop = run.force_stop().cloned().unwrap();

        let started = run.next_event().await.unwrap();
        assert!(matches!(started, ExecEvent::Started { force_stop: Some(_), .. }));
        stop.invoke();
        stop.invoke();

        let mut events = Vec::new();
        let code = timeout(Duration::from_secs(5), run.drain_into(&mut |e| events.push(e)))
            .await
            .unwrap();
        assert_eq!(code, None);
        assert!(matches!(events.last(), Some(ExecEvent::Exited { code: None })));
        assert!(run.next_event().await.is_none());
        stop.invoke();
    }

    #[tokio::test]
    async fn force_stop_after_exit_is_harmless() {
        let process = spawn_sh("pio_t4", true);
        write_input(&process.stdin, b"exit 0\n").await.unwrap();
        let run = ScriptRun::new("pio_t4", true, process);
        let stop = run.force_stop().cloned().unwrap();
        let outcome = run.collect().await;
        assert_eq!(outcome.exit_code, Some(0));
        stop.invoke();
        stop.invoke();
        assert!(stop.is_fired());
    }

    #[tokio::test]
    async fn interactive_writes_are_echoed_before_exit() {
        let process = spawn_sh("pio_t5", true);
        let shell = InteractiveShell::new("pio_t5", process);
        let (input, run) = shell.into_parts();
        input.write("echo hi").await.unwrap();
        input.finish().await.unwrap();
        assert!(input.write("echo late").await.is_err());

        let outcome = timeout(Duration::from_secs(5), run.collect()).await.unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        let texts: Vec<_> = outcome
            .outputs
            .iter()
            .map(|o| match o {
                ShellOutput::Text { origin, content } => (*origin, content.as_str()),
                other => panic!("unexpected output: {other:?}"),
            })
            .collect();
        assert!(texts.contains(&(OutputOrigin::Input, "echo hi")));
        assert!(texts.contains(&(OutputOrigin::Stdout, "hi")));
        assert!(texts.contains(&(OutputOrigin::Input, "exit")));
    }
}
