//! User-Agent string shared by listing and content requests.

/// Default User-Agent for archive requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("waybackdl/{version} (web-archive-mirror)")
}
