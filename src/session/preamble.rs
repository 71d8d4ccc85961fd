//! Shell input written ahead of an invocation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

pub const PAGE_CONFIG_DIR: &str = "PAGE_CONFIG_DIR";
pub const PAGE_CONFIG_FILE: &str = "PAGE_CONFIG_FILE";
pub const PAGE_WORK_DIR: &str = "PAGE_WORK_DIR";
pub const PAGE_WORK_FILE: &str = "PAGE_WORK_FILE";

/// Page-context variables exported for one invocation. All empty when the
/// invocation has no page context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExports {
    pub config_dir: String,
    pub config_file: String,
    pub work_dir: String,
    pub work_file: String,
}

impl PageExports {
    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (PAGE_CONFIG_DIR, &self.config_dir),
            (PAGE_CONFIG_FILE, &self.config_file),
            (PAGE_WORK_DIR, &self.work_dir),
            (PAGE_WORK_FILE, &self.work_file),
        ]
    }
}

/// Shell-safe single-quote escaping.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".into()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// `export KEY='value'` with the value single-quote escaped.
pub fn export_line(key: &str, value: &str) -> String {
    format!("export {key}={}", shell_quote(value))
}

/// Whether `name` can be exported as a shell variable.
pub fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Export lines for the page context followed by caller parameters.
///
/// Parameters whose names are not shell identifiers are skipped.
pub fn build_preamble(page: &PageExports, params: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in page.pairs() {
        out.push_str(&export_line(key, value));
        out.push('\n');
    }
    for (key, value) in params {
        if !is_shell_identifier(key) {
            tracing::warn!(param = %key, "skipping parameter with invalid shell name");
            continue;
        }
        out.push_str(&export_line(key, value));
        out.push('\n');
    }
    out
}

/// `sleep <secs>;` line giving the shell time to settle before the payload.
pub fn delay_directive(delay: Duration) -> String {
    if delay.is_zero() {
        return String::new();
    }
    format!("sleep {};\n", delay.as_secs_f64())
}

/// `<wrapper> <script> [<tag>]`, each word single-quoted.
pub fn invocation_line(wrapper: &str, script: &str, tag: Option<&str>) -> String {
    let mut line = format!("{} {}", shell_quote(wrapper), shell_quote(script));
    if let Some(tag) = tag {
        let _ = write!(line, " {}", shell_quote(tag));
    }
    line
}

/// Full stdin payload for one session: exports, delay, invocation, then two
/// `exit` lines so the shell terminates even if the script does not.
pub fn build_session_input(preamble: &str, delay: Duration, invocation: &str) -> String {
    let mut out = String::with_capacity(preamble.len() + invocation.len() + 32);
    out.push_str(preamble);
    out.push_str(&delay_directive(delay));
    out.push_str(invocation);
    out.push_str("\nexit\nexit\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(export_line("KEY", "O'Brien"), "export KEY='O'\\''Brien'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
    }

    #[tokio::test]
    async fn exported_value_round_trips_through_sh() {
        let value = "O'Brien $HOME `id` \"q\" \\n";
        let script = format!("{}\nprintf '%s' \"$KEY\"", export_line("KEY", value));
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .output()
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), value);
    }

    #[tokio::test]
    async fn invocation_survives_awkward_paths() {
        let dir = crate::testsupport::TestTempDir::new("invocation-paths");
        let wrapper = dir.write_text(
            "Application Support/it's $dir/wrap.sh",
            "printf '%s|%s' \"$1\" \"$2\"\n",
        );
        let script = dir.child("Application Support/`s` \"x\".sh");
        let line = invocation_line(
            &wrapper.display().to_string(),
            &script.display().to_string(),
            Some("pio_1"),
        );
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!("sh {line}"))
            .output()
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            format!("{}|pio_1", script.display())
        );
    }

    #[test]
    fn preamble_exports_page_context_then_params() {
        let page = PageExports {
            config_dir: "/p".into(),
            config_file: "/p/page.xml".into(),
            work_dir: "/p".into(),
            work_file: "/p/page.xml".into(),
        };
        let params = BTreeMap::from([
            ("name".to_string(), "it's".to_string()),
            ("bad-name".to_string(), "x".to_string()),
        ]);
        assert_eq!(
            build_preamble(&page, &params),
            "export PAGE_CONFIG_DIR='/p'\n\
             export PAGE_CONFIG_FILE='/p/page.xml'\n\
             export PAGE_WORK_DIR='/p'\n\
             export PAGE_WORK_FILE='/p/page.xml'\n\
             export name='it'\\''s'\n"
        );
    }

    #[test]
    fn missing_page_context_exports_empty_strings() {
        let preamble = build_preamble(&PageExports::default(), &BTreeMap::new());
        assert_eq!(preamble.lines().count(), 4);
        assert!(preamble.lines().all(|line| line.ends_with("=''")));
    }

    #[test]
    fn identifiers() {
        assert!(is_shell_identifier("_a1"));
        assert!(!is_shell_identifier("1a"));
        assert!(!is_shell_identifier(""));
        assert!(!is_shell_identifier("a b"));
    }

    #[test]
    fn session_input_ends_with_two_exits() {
        let input = build_session_input(
            "export A='1'\n",
            Duration::from_millis(200),
            &invocation_line("/w.sh", "/s.sh", Some("pio_1")),
        );
        assert_eq!(
            input,
            "export A='1'\nsleep 0.2;\n'/w.sh' '/s.sh' 'pio_1'\nexit\nexit\n"
        );
        assert_eq!(invocation_line("/w.sh", "/s.sh", None), "'/w.sh' '/s.sh'");
        assert_eq!(delay_directive(Duration::ZERO), "");
    }
}
