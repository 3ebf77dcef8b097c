use thiserror::Error;

/// Errors from the controller and LAPI clients.
///
/// `unibouncer-core` folds these into its own `CoreError`; nothing above
/// the core crate sees them directly.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials or API key rejected at login or client construction.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The controller answered 401 to an authenticated request (session
    /// cookie expired or revoked, or API key withdrawn).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// CA bundle unreadable or client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote errors ───────────────────────────────────────────────
    /// Failure reported by a `rest/` endpoint, either as an HTTP status or
    /// as `meta.rc != "ok"` in the envelope.
    #[error("Legacy API error: {message}")]
    LegacyApi { message: String },

    /// Non-success status from a v2 endpoint (zones, zone policies).
    #[error("v2 API error (HTTP {status}): {message}")]
    V2Api { status: u16, message: String },

    /// Non-success status from the CrowdSec Local API.
    #[error("CrowdSec LAPI error (HTTP {status}): {message}")]
    Lapi { status: u16, message: String },

    /// A success response whose body did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if logging in again may let the same call succeed.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if the same call may succeed later without changes:
    /// timeouts, refused connections, and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::V2Api { status, .. } | Self::Lapi { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` for a 404 from either remote.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::V2Api { status, .. } | Self::Lapi { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// First 200 bytes of a response body, cut on a char boundary.
pub(crate) fn body_preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let preview = body_preview(&body);
        assert!(preview.len() <= 200);
        assert!(body.starts_with(preview));
    }

    #[test]
    fn only_server_errors_are_transient() {
        assert!(Error::Lapi { status: 503, message: String::new() }.is_transient());
        assert!(!Error::Lapi { status: 403, message: String::new() }.is_transient());
        assert!(!Error::SessionExpired.is_transient());
    }
}
