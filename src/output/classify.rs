//! Line classification for raw shell output.

use super::model::{OutputOrigin, ShellOutput};

/// Opening of a progress record: `progress:[<current>/<total>]`.
pub const PROGRESS_PREFIX: &str = "progress:[";

/// Prefix of an inline image record: `@img:<path>`.
pub const IMAGE_MARKER: &str = "@img:";

/// Classify one line. Blank lines yield `None`.
///
/// Progress is checked first, then the image marker; everything else is a
/// text line tagged with `origin`. A bare `@img:` with no path stays Text.
pub fn classify_line(line: &str, origin: OutputOrigin) -> Option<ShellOutput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some((current, total)) = parse_progress(line) {
        return Some(ShellOutput::Progress { current, total });
    }
    if let Some(path) = line.strip_prefix(IMAGE_MARKER) {
        let path = path.trim();
        if !path.is_empty() {
            return Some(ShellOutput::Image {
                path: path.to_string(),
            });
        }
    }
    Some(ShellOutput::text(origin, line))
}

/// Classify a fully captured output blob. `None` yields no events.
pub fn classify_output(raw: Option<&str>, origin: OutputOrigin) -> Vec<ShellOutput> {
    raw.map(|raw| {
        raw.split('\n')
            .filter_map(|line| classify_line(line, origin))
            .collect()
    })
    .unwrap_or_default()
}

/// Parse `progress:[-?\d+/\d+]`. Values that overflow `i64` do not match.
pub fn parse_progress(line: &str) -> Option<(i64, i64)> {
    let inner = line.strip_prefix(PROGRESS_PREFIX)?.strip_suffix(']')?;
    let (current, total) = inner.split_once('/')?;
    let digits = current.strip_prefix('-').unwrap_or(current);
    if !is_digits(digits) || !is_digits(total) {
        return None;
    }
    Some((current.parse().ok()?, total.parse().ok()?))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdout(content: &str) -> ShellOutput {
        ShellOutput::text(OutputOrigin::Stdout, content)
    }

    #[test]
    fn classifies_in_source_order() {
        let events = classify_output(
            Some("a\nprogress:[1/10]\n@img:/x.png\nb"),
            OutputOrigin::Stdout,
        );
        assert_eq!(
            events,
            vec![
                stdout("a"),
                ShellOutput::Progress { current: 1, total: 10 },
                ShellOutput::Image {
                    path: "/x.png".into()
                },
                stdout("b"),
            ]
        );
    }

    #[test]
    fn blank_lines_and_absent_input_are_dropped() {
        assert_eq!(
            classify_output(Some("a\n\n   \nb\n"), OutputOrigin::Stdout),
            vec![stdout("a"), stdout("b")]
        );
        assert!(classify_output(None, OutputOrigin::Stdout).is_empty());
        assert_eq!(classify_line("\t", OutputOrigin::Stderr), None);
    }

    #[test]
    fn progress_pattern() {
        assert_eq!(parse_progress("progress:[-1/3]"), Some((-1, 3)));
        assert_eq!(parse_progress("progress:[0/0]"), Some((0, 0)));
        assert_eq!(parse_progress("progress:[1/-3]"), None);
        assert_eq!(parse_progress("progress:[a/3]"), None);
        assert_eq!(parse_progress("progress:[1/3] done"), None);
        assert_eq!(parse_progress("progress:[/3]"), None);
        assert_eq!(parse_progress("progress:[99999999999999999999/1]"), None);
        assert_eq!(
            classify_line("  progress:[2/4]  ", OutputOrigin::Stdout),
            Some(ShellOutput::Progress { current: 2, total: 4 })
        );
    }

    #[test]
    fn progress_wins_over_image_and_malformed_progress_is_text() {
        assert_eq!(
            classify_line("progress:[x/4]", OutputOrigin::Stderr),
            Some(ShellOutput::text(OutputOrigin::Stderr, "progress:[x/4]"))
        );
    }

    #[test]
    fn image_marker_without_path_is_text() {
        assert_eq!(classify_line("@img:", OutputOrigin::Stdout), Some(stdout("@img:")));
        assert_eq!(
            classify_line("@img: /sdcard/a.png", OutputOrigin::Stdout),
            Some(ShellOutput::Image {
                path: "/sdcard/a.png".into()
            })
        );
    }

    #[test]
    fn origin_is_preserved_on_text() {
        assert_eq!(
            classify_line("oops", OutputOrigin::Stderr),
            Some(ShellOutput::text(OutputOrigin::Stderr, "oops"))
        );
    }
}
