//! Pure placeholder resolution for the wrapper template.
//!
//! Placeholders look like `$({NAME})`. Resolution is a single left-to-right
//! pass, so substituted values are never re-scanned, and unknown names are
//! kept verbatim so a partial environment still produces a runnable wrapper.

use std::collections::BTreeMap;

pub const TOOLKIT: &str = "TOOLKIT";
pub const START_DIR: &str = "START_DIR";
pub const TEMP_DIR: &str = "TEMP_DIR";
pub const ROOT_PERMISSION: &str = "ROOT_PERMISSION";
pub const SDCARD_PATH: &str = "SDCARD_PATH";
pub const ANDROID_SDK: &str = "ANDROID_SDK";
/// Bound last, to the path the resolved wrapper itself is written to.
pub const EXECUTOR_PATH: &str = "EXECUTOR_PATH";

const OPEN: &str = "$({";
const CLOSE: &str = "})";

/// Render the placeholder token for `name`.
pub fn placeholder(name: &str) -> String {
    format!("{OPEN}{name}{CLOSE}")
}

/// Substitute every `$({KEY})` whose key is in `vars`. Carriage returns are
/// dropped first so templates authored on Windows still run.
pub fn resolve_template(template: &str, vars: &BTreeMap<String, String>) -> String {
    let template = template.replace('\r', "");
    let mut out = String::with_capacity(template.len());
    let mut rest = template.as_str();
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let value = after
            .find(CLOSE)
            .and_then(|end| vars.get(&after[..end]).map(|value| (end, value)));
        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + CLOSE.len()..];
            }
            None => {
                out.push_str(OPEN);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Second phase: bind `$({EXECUTOR_PATH})` to the wrapper's own location.
pub fn bind_executor_path(resolved: &str, executor_path: &str) -> String {
    resolved.replace(&placeholder(EXECUTOR_PATH), executor_path)
}
