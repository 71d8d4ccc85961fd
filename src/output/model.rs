//! Typed shell output events and the reducers callers build on them.

use serde::{Deserialize, Serialize};

/// Pipe a text line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputOrigin {
    /// Process stdout, rendered as an ordinary log line.
    Stdout,
    /// Process stderr, rendered with error severity.
    Stderr,
    /// Echo of a command the caller wrote into an interactive session.
    Input,
}

impl OutputOrigin {
    /// `#rrggbb` color used when rendering lines of this origin.
    pub fn color_hex(self) -> &'static str {
        match self {
            Self::Stdout => "#00cc55",
            Self::Stderr => "#ff0000",
            Self::Input => "#808080",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Stderr)
    }
}

/// One classified output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShellOutput {
    Text { origin: OutputOrigin, content: String },
    Image { path: String },
    Progress { current: i64, total: i64 },
}

impl ShellOutput {
    pub fn text(origin: OutputOrigin, content: impl Into<String>) -> Self {
        Self::Text {
            origin,
            content: content.into(),
        }
    }

    /// Content of a `Text` event, `None` otherwise.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Text events in order, Image and Progress dropped.
pub fn text_lines(outputs: &[ShellOutput]) -> impl Iterator<Item = &str> {
    outputs.iter().filter_map(ShellOutput::as_text)
}

/// All text content joined with `\n` and trimmed.
pub fn joined_text(outputs: &[ShellOutput]) -> String {
    text_lines(outputs)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
