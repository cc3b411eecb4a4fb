//! Shared helpers for extractors: host matching and static regexes.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Returns true if the URL's host is `suffix` or ends with it.
///
/// An empty suffix matches every parsable URL.
#[must_use]
pub fn has_host(url: &str, suffix: &str) -> bool {
    let Some(host) = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    host.ends_with(&suffix.to_ascii_lowercase())
}

/// Returns capture group `group` of the first match of `regex` in `input`.
#[must_use]
pub fn capture(regex: &Regex, input: &str, group: usize) -> Option<String> {
    regex
        .captures(input)
        .and_then(|caps| caps.get(group).map(|m| m.as_str().to_string()))
}
