//! Credential redaction for log lines and error text.
//!
//! Anything that may end up in a log record or an MCP error payload and
//! carries text produced by the remote service goes through [`redact`].

use std::sync::LazyLock;

use regex::Regex;

pub const REDACTED: &str = "***REDACTED***";

static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b((?:password|client_secret|api_key|access_token|token|pat|authorization)["']?\s*[:=]\s*["']?)([^"'\s,;&]+)"#,
    )
    .expect("valid regex")
});

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:bearer|basic)\s+)([A-Za-z0-9\-._~+/]+=*)").expect("valid regex")
});

/// Replace credential values in `text` with [`REDACTED`].
///
/// Covers `key=value` / `"key": "value"` pairs for common secret names and
/// `Bearer` / `Basic` authorization schemes.
pub fn redact(text: &str) -> String {
    let text = SCHEME_RE.replace_all(text, format!("${{1}}{REDACTED}"));
    KEY_VALUE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let value = &caps[2];
            if value.starts_with("***")
                || value.eq_ignore_ascii_case("bearer")
                || value.eq_ignore_ascii_case("basic")
            {
                caps[0].to_string()
            } else {
                format!("{}{REDACTED}", &caps[1])
            }
        })
        .into_owned()
}
