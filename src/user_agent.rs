//! Default User-Agent string for download and extractor HTTP traffic.
//!
//! The default mimics a desktop browser and appends the tool name and
//! version.

/// Browser portion of the default User-Agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for every request made by the crate.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{BROWSER_USER_AGENT} mediagrab/{version}")
}
