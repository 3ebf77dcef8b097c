// ── Core error types ──
//
// Engine-level errors. Transport details are folded into a few
// domain-appropriate variants by the `From<unibouncer_api::Error>` impl.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── Remote API errors (wrapped, not exposed raw) ─────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
        /// Whether retrying the same call later may succeed.
        transient: bool,
    },

    // ── Lifecycle errors ─────────────────────────────────────────────
    /// Startup scaffolding (snapshot, zones, initial ordering) failed.
    #[error("Firewall bootstrap failed: {message}")]
    Bootstrap { message: String },

    /// The decision stream ended or its consumer went away.
    #[error("Decision stream terminated: {reason}")]
    SourceTerminated { reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Attribute a startup failure to `context`. Credential and
    /// reachability problems pass through so they keep their own exit path.
    pub fn bootstrap(context: &str, err: CoreError) -> Self {
        match err {
            Self::AuthenticationFailed { .. } | Self::ConnectionFailed { .. } | Self::Timeout => {
                err
            }
            other => Self::Bootstrap {
                message: format!("{context}: {other}"),
            },
        }
    }

    /// Returns `true` if retrying the failed call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => true,
            Self::Api { transient, .. } => *transient,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<unibouncer_api::Error> for CoreError {
    fn from(err: unibouncer_api::Error) -> Self {
        let transient = err.is_transient();
        match err {
            unibouncer_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            unibouncer_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            unibouncer_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                        transient,
                    }
                }
            }
            unibouncer_api::Error::Tls(message) => CoreError::ConnectionFailed {
                url: "<tls>".into(),
                reason: message,
            },
            unibouncer_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            unibouncer_api::Error::V2Api { status, message }
            | unibouncer_api::Error::Lapi { status, message } => CoreError::Api {
                message,
                status: Some(status),
                transient,
            },
            unibouncer_api::Error::LegacyApi { message } => CoreError::Api {
                message,
                status: None,
                transient,
            },
            unibouncer_api::Error::Deserialization { message, .. } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
                transient,
            },
        }
    }
}
