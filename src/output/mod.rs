//! Shell output model, line classification, and row translation.

mod classify;
mod model;
mod translate;

pub use classify::{classify_line, classify_output, parse_progress, IMAGE_MARKER, PROGRESS_PREFIX};
pub use model::{joined_text, text_lines, OutputOrigin, ShellOutput};
pub use translate::OutputTranslator;
