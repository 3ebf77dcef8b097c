//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use unibouncer_config::ConfigError;
use unibouncer_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(unibouncer::connection_failed),
        help(
            "Check that the service is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(unibouncer::timeout),
        help("Raise unifi.timeout_secs or crowdsec.timeout_secs if the service is slow.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(unibouncer::auth_failed),
        help(
            "Verify the UniFi credentials and the CrowdSec bouncer key.\n\
             Register a bouncer key with: cscli bouncers add unibouncer"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for {section}")]
    #[diagnostic(
        code(unibouncer::no_credentials),
        help(
            "Set the value in the config file, name an environment variable with\n\
             the matching *_env key, or store it in the system keyring under\n\
             service 'unibouncer'."
        )
    )]
    NoCredentials { section: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(unibouncer::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(unibouncer::no_config),
        help("Create one with: unibouncer init --config {path}")
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(unibouncer::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(unibouncer::config))]
    Config { message: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Firewall bootstrap failed: {message}")]
    #[diagnostic(
        code(unibouncer::bootstrap),
        help("Check that the configured zones and rulesets exist on the controller.")
    )]
    Bootstrap { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(unibouncer::api_error))]
    Api { message: String },

    #[error("Decision stream terminated: {reason}")]
    #[diagnostic(code(unibouncer::source_terminated))]
    SourceTerminated { reason: String },

    #[error(transparent)]
    #[diagnostic(code(unibouncer::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. }
            | Self::NoConfig { .. }
            | Self::ConfigExists { .. }
            | Self::Config { .. } => exit_code::USAGE,
            Self::Bootstrap { .. }
            | Self::Api { .. }
            | Self::SourceTerminated { .. }
            | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ─────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout => Self::Timeout,
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Api { message, status, .. } => Self::Api {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Bootstrap { message } => Self::Bootstrap { message },
            CoreError::SourceTerminated { reason } => Self::SourceTerminated { reason },
            CoreError::Config { message } => Self::Config { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { section } => Self::NoCredentials { section },
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::AlreadyExists { path } => Self::ConfigExists {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
