//! Resource-style translation of output rows.
//!
//! Rows shaped `@string:NAME ...` or `@string/NAME ...` are replaced by the
//! configured string for `NAME`. When the name is unknown, a `[(fallback)]`
//! fragment in the row is used instead; otherwise the row is left as is.

use std::collections::BTreeMap;

use super::model::ShellOutput;

const STRING_KIND: &str = "string";
const FALLBACK_OPEN: &str = "[(";
const FALLBACK_CLOSE: &str = ")]";

/// Looks up `@string` rows in a name → text table.
#[derive(Debug, Clone, Default)]
pub struct OutputTranslator {
    strings: BTreeMap<String, String>,
}

impl OutputTranslator {
    pub fn new(strings: BTreeMap<String, String>) -> Self {
        Self { strings }
    }

    /// Translate one row.
    pub fn translate_row<'a>(&'a self, row: &'a str) -> &'a str {
        let trimmed = row.trim();
        let Some(name) = resource_name(trimmed) else {
            return row;
        };
        if let Some(text) = self.strings.get(name) {
            return text;
        }
        fallback(trimmed).unwrap_or(row)
    }

    /// Translate the content of every text event in place.
    pub fn translate_all(&self, outputs: &mut [ShellOutput]) {
        for output in outputs {
            if let ShellOutput::Text { content, .. } = output {
                let translated = self.translate_row(content);
                if translated != content.as_str() {
                    *content = translated.to_string();
                }
            }
        }
    }
}

/// Resource name of a `@string:` / `@string/` row, matched case-insensitively.
fn resource_name(row: &str) -> Option<&str> {
    let rest = row.strip_prefix('@')?;
    let kind = rest.get(..STRING_KIND.len())?;
    if !kind.eq_ignore_ascii_case(STRING_KIND) {
        return None;
    }
    let rest = &rest[STRING_KIND.len()..];
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix('/'))?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

fn fallback(row: &str) -> Option<&str> {
    let start = row.find(FALLBACK_OPEN)? + FALLBACK_OPEN.len();
    let end = row[start..].find(FALLBACK_CLOSE)? + start;
    Some(&row[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputOrigin;

    fn translator() -> OutputTranslator {
        OutputTranslator::new(BTreeMap::from([(
            "home_shell_01".to_string(),
            "Battery OK".to_string(),
        )]))
    }

    #[test]
    fn known_names_resolve_with_either_separator() {
        let t = translator();
        assert_eq!(t.translate_row("@string:home_shell_01"), "Battery OK");
        assert_eq!(t.translate_row("@string/home_shell_01"), "Battery OK");
        assert_eq!(t.translate_row("  @STRING:home_shell_01  "), "Battery OK");
    }

    #[test]
    fn unknown_names_use_fallback_or_pass_through() {
        let t = translator();
        assert_eq!(t.translate_row("@string:missing[(Default text)]"), "Default text");
        assert_eq!(t.translate_row("@string:missing"), "@string:missing");
        assert_eq!(t.translate_row("@string:"), "@string:");
        assert_eq!(t.translate_row("plain [(x)]"), "plain [(x)]");
        assert_eq!(t.translate_row("@dimen:home_shell_01"), "@dimen:home_shell_01");
    }

    #[test]
    fn translate_all_touches_only_text() {
        let mut outputs = vec![
            ShellOutput::text(OutputOrigin::Stdout, "@string:home_shell_01"),
            ShellOutput::Image {
                path: "@string:home_shell_01".into(),
            },
        ];
        translator().translate_all(&mut outputs);
        assert_eq!(outputs[0].as_text(), Some("Battery OK"));
        assert_eq!(
            outputs[1],
            ShellOutput::Image {
                path: "@string:home_shell_01".into()
            }
        );
    }
}
