//! Default User-Agent string.
//!
//! Several program sites reject non-browser agents, so the default mirrors a
//! desktop browser. `user_agent` in the config file overrides it.

/// Browser-like User-Agent used for metadata and PDF requests.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the default User-Agent.
#[must_use]
pub fn default_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}
