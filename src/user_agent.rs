//! User-Agent string shared by the source and sink HTTP clients.

/// Project URL sent in the User-Agent (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/url-relay/url-relay";

/// Default User-Agent for every outbound request.
#[must_use]
pub(crate) fn default_relay_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("url-relay/{version} (+{PROJECT_UA_URL})")
}
