//! Terminal rendering of live session events.

use std::io::{self, Write};

use crossterm::style::{Color, Print, PrintStyledContent, Stylize};
use crossterm::QueueableCommand;
use serde_json::json;

use crate::output::{OutputOrigin, ShellOutput};
use crate::session::{EventSink, ExecEvent};

const PROGRESS_WIDTH: usize = 24;

/// How events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Colored text per origin.
    Color,
    Plain,
    /// One JSON object per line.
    Json,
}

/// Writes events to `out` as they arrive.
pub struct EventRenderer<W: Write + Send> {
    out: W,
    mode: RenderMode,
}

impl EventRenderer<io::Stdout> {
    pub fn stdout(mode: RenderMode) -> Self {
        Self::new(io::stdout(), mode)
    }
}

impl<W: Write + Send> EventRenderer<W> {
    pub fn new(out: W, mode: RenderMode) -> Self {
        Self { out, mode }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, event: &ExecEvent) -> io::Result<()> {
        match self.mode {
            RenderMode::Json => {
                writeln!(self.out, "{}", event_json(event))?;
            }
            RenderMode::Plain => {
                if let Some(text) = event_text(event) {
                    writeln!(self.out, "{text}")?;
                }
            }
            RenderMode::Color => {
                if let Some(text) = event_text(event) {
                    self.out
                        .queue(PrintStyledContent(text.with(event_color(event))))?
                        .queue(Print("\n"))?;
                }
            }
        }
        self.out.flush()
    }
}

impl<W: Write + Send> EventSink for EventRenderer<W> {
    fn on_event(&mut self, event: ExecEvent) {
        if let Err(err) = self.render(&event) {
            tracing::warn!(error = %err, "failed to render session event");
        }
    }
}

/// Plain text for an event; `None` for events with nothing to show.
pub fn event_text(event: &ExecEvent) -> Option<String> {
    match event {
        ExecEvent::Started { command, .. } if command.trim().is_empty() => {
            Some("shell@android:".to_string())
        }
        ExecEvent::Started { command, .. } => Some(format!("shell@android:\n{}", command.trim_end())),
        ExecEvent::Output(ShellOutput::Text { origin, content }) => Some(match origin {
            OutputOrigin::Input => format!("$ {content}"),
            _ => content.clone(),
        }),
        ExecEvent::Output(ShellOutput::Image { path }) => Some(format!("[image] {path}")),
        ExecEvent::Output(ShellOutput::Progress { current, total }) => {
            Some(progress_bar(*current, *total, PROGRESS_WIDTH))
        }
        ExecEvent::Exited { code: Some(code) } => Some(format!("[exit {code}]")),
        ExecEvent::Exited { code: None } => Some("[terminated]".to_string()),
    }
}

/// `[#####-----] 5/10`. A negative current value renders as indeterminate.
pub fn progress_bar(current: i64, total: i64, width: usize) -> String {
    if current < 0 || total <= 0 {
        return format!("[{}] {current}/{total}", "?".repeat(width));
    }
    let ratio = (current.min(total) as f64) / (total as f64);
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {current}/{total}",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )
}

fn event_color(event: &ExecEvent) -> Color {
    match event {
        ExecEvent::Output(ShellOutput::Text { origin, .. }) => hex_color(origin.color_hex()),
        ExecEvent::Output(ShellOutput::Progress { .. }) => Color::Cyan,
        ExecEvent::Output(ShellOutput::Image { .. }) => Color::Magenta,
        ExecEvent::Started { .. } | ExecEvent::Exited { .. } => {
            hex_color(OutputOrigin::Input.color_hex())
        }
    }
}

/// Parse `#rrggbb`; anything else falls back to the terminal default.
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (digits.len(), channel(0..2), channel(2..4), channel(4..6)) {
        (6, Some(r), Some(g), Some(b)) => Color::Rgb { r, g, b },
        _ => Color::Reset,
    }
}

/// JSON object for an event.
pub fn event_json(event: &ExecEvent) -> serde_json::Value {
    match event {
        ExecEvent::Started {
            tag,
            command,
            force_stop,
        } => json!({
            "event": "started",
            "tag": tag,
            "command": command,
            "interruptible": force_stop.is_some(),
        }),
        ExecEvent::Output(output) => json!({
            "event": "output",
            "output": output,
        }),
        ExecEvent::Exited { code } => json!({
            "event": "exited",
            "code": code,
        }),
    }
}
