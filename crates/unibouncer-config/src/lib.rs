//! Configuration for the unibouncer daemon.
//!
//! One TOML file with `[crowdsec]`, `[unifi]`, `[firewall]`, and `[sync]`
//! sections, layered under `UNIBOUNCER_*` environment variables, with a
//! keyring + env + plaintext chain for secrets. [`Config::resolve`]
//! validates everything and translates it into `unibouncer_core` types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use unibouncer_core::{
    AuthCredentials, ControllerConfig, EngineConfig, FirewallMode, GroupSelection, SourceConfig,
    SyncConfig, TlsVerification, ZonePair,
};

const KEYRING_SERVICE: &str = "unibouncer";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for {section}")]
    NoCredentials { section: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub crowdsec: CrowdsecSection,
    pub unifi: UnifiSection,
    pub firewall: FirewallSection,
    pub sync: SyncSection,
}

/// `[crowdsec]`: where to pull decisions from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrowdsecSection {
    /// LAPI base URL.
    pub url: String,
    /// Bouncer API key (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the bouncer API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub update_interval_secs: u64,
    /// Only pull decisions from these origins.
    pub origins: Vec<String>,
    /// Only pull decisions with these scopes.
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for CrowdsecSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/".into(),
            api_key: None,
            api_key_env: None,
            update_interval_secs: 10,
            origins: Vec::new(),
            scopes: Vec::new(),
            ca_cert: None,
            timeout_secs: 10,
        }
    }
}

/// How to authenticate against the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Username and password session.
    #[default]
    Legacy,
    /// `X-API-KEY` header.
    ApiKey,
}

/// `[unifi]`: the controller and site to manage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnifiSection {
    /// Controller base URL (e.g., "https://192.168.1.1").
    pub controller: String,
    pub site: String,
    pub auth_mode: AuthMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password (plaintext; prefer keyring).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Accept self-signed certificates. Ignored when `ca_cert` is set.
    pub insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for UnifiSection {
    fn default() -> Self {
        Self {
            controller: String::new(),
            site: "default".into(),
            auth_mode: AuthMode::Legacy,
            username: None,
            password: None,
            api_key: None,
            api_key_env: None,
            insecure: true,
            ca_cert: None,
            timeout_secs: 30,
        }
    }
}

/// `[firewall]`: group layout and wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FirewallSection {
    pub mode: FirewallMode,
    pub ipv6: bool,
    pub max_group_size: usize,
    pub group_prefix: String,
    pub group_selection: GroupSelection,
    pub logging: bool,
    pub rule_index_start: u32,
    pub ipv4_rulesets: Vec<String>,
    pub ipv6_rulesets: Vec<String>,
    pub zone_pairs: Vec<ZonePair>,
}

impl Default for FirewallSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            mode: engine.mode,
            ipv6: engine.ipv6_enabled,
            max_group_size: engine.max_group_size,
            group_prefix: engine.group_prefix,
            group_selection: engine.group_selection,
            logging: engine.logging,
            rule_index_start: engine.rule_index_start,
            ipv4_rulesets: engine.ipv4_rulesets,
            ipv6_rulesets: engine.ipv6_rulesets,
            zone_pairs: engine.zone_pairs,
        }
    }
}

/// `[sync]`: flush timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSection {
    pub inactivity_ms: u64,
    pub initial_delay_secs: u64,
    pub retry_secs: u64,
    pub channel_capacity: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            inactivity_ms: 1_000,
            initial_delay_secs: 10,
            retry_secs: 30,
            channel_capacity: 16,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unibouncer", "unibouncer").map_or_else(
        || PathBuf::from("/etc/unibouncer/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNIBOUNCER_").split("__"))
}

/// Load config from `path` (must exist) or from the default location
/// (may be absent; defaults and environment still apply).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound { path: p.to_owned() });
        }
        Some(p) => p.to_owned(),
        None => config_path(),
    };
    Ok(figment_for(&path).extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Write a starter config to `path`. Refuses to overwrite unless `force`.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_owned(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Env var named by `env_name`, then keyring `account`, then plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    account: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Named env var
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, account) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config (or UNIBOUNCER_* env override)
    plaintext
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::from(s.to_owned()))
}

/// Resolve the controller credentials selected by `auth_mode`.
pub fn resolve_auth(unifi: &UnifiSection) -> Result<AuthCredentials, ConfigError> {
    match unifi.auth_mode {
        AuthMode::ApiKey => resolve_secret(
            unifi.api_key_env.as_deref(),
            "unifi/api-key",
            unifi.api_key.as_deref(),
        )
        .map(AuthCredentials::ApiKey)
        .ok_or_else(|| ConfigError::NoCredentials {
            section: "unifi (api_key)".into(),
        }),
        AuthMode::Legacy => {
            let username = unifi
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ConfigError::NoCredentials {
                    section: "unifi (username)".into(),
                })?;
            let password = resolve_secret(None, "unifi/password", unifi.password.as_deref())
                .ok_or_else(|| ConfigError::NoCredentials {
                    section: "unifi (password)".into(),
                })?;
            Ok(AuthCredentials::Credentials { username, password })
        }
    }
}

// ── Translation to core types ───────────────────────────────────────

/// Fully validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub controller: ControllerConfig,
    pub source: SourceConfig,
    pub engine: EngineConfig,
    pub sync: SyncConfig,
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    if raw.trim().is_empty() {
        return Err(invalid(field, "must be set"));
    }
    let url: url::Url = raw
        .parse()
        .map_err(|e| invalid(field, format!("invalid URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

fn positive(field: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

impl Config {
    /// Validate and translate into core configuration.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            controller: self.controller_config()?,
            source: self.source_config()?,
            engine: self.engine_config()?,
            sync: self.sync_config()?,
        })
    }

    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let unifi = &self.unifi;
        let url = parse_url("unifi.controller", &unifi.controller)?;
        if unifi.site.trim().is_empty() {
            return Err(invalid("unifi.site", "must not be empty"));
        }

        let tls = if let Some(ref ca_path) = unifi.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else if unifi.insecure {
            TlsVerification::DangerAcceptInvalid // local controllers are typically self-signed
        } else {
            TlsVerification::SystemDefaults
        };

        Ok(ControllerConfig {
            url,
            auth: resolve_auth(unifi)?,
            site: unifi.site.clone(),
            tls,
            timeout: Duration::from_secs(positive("unifi.timeout_secs", unifi.timeout_secs)?),
        })
    }

    pub fn source_config(&self) -> Result<SourceConfig, ConfigError> {
        let cs = &self.crowdsec;
        let api_key = resolve_secret(
            cs.api_key_env.as_deref(),
            "crowdsec/api-key",
            cs.api_key.as_deref(),
        )
        .ok_or_else(|| ConfigError::NoCredentials {
            section: "crowdsec (api_key)".into(),
        })?;

        Ok(SourceConfig {
            url: parse_url("crowdsec.url", &cs.url)?,
            api_key,
            tls: cs
                .ca_cert
                .clone()
                .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa),
            timeout: Duration::from_secs(positive("crowdsec.timeout_secs", cs.timeout_secs)?),
            update_interval: Duration::from_secs(positive(
                "crowdsec.update_interval_secs",
                cs.update_interval_secs,
            )?),
            origins: cs.origins.clone(),
            scopes: cs.scopes.clone(),
        })
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let fw = &self.firewall;

        if fw.max_group_size == 0 {
            return Err(invalid("firewall.max_group_size", "must be at least 1"));
        }
        if fw.group_prefix.is_empty()
            || !fw
                .group_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "firewall.group_prefix",
                "must be non-empty and contain only letters, digits, '-' or '_'",
            ));
        }
        if fw.mode != FirewallMode::Zones {
            if fw.ipv4_rulesets.is_empty() {
                return Err(invalid("firewall.ipv4_rulesets", "must not be empty"));
            }
            if fw.ipv6 && fw.ipv6_rulesets.is_empty() {
                return Err(invalid("firewall.ipv6_rulesets", "must not be empty"));
            }
        }
        if fw.mode != FirewallMode::Rules && fw.zone_pairs.is_empty() {
            return Err(invalid("firewall.zone_pairs", "must not be empty"));
        }

        Ok(EngineConfig {
            mode: fw.mode,
            ipv6_enabled: fw.ipv6,
            max_group_size: fw.max_group_size,
            group_selection: fw.group_selection,
            group_prefix: fw.group_prefix.clone(),
            logging: fw.logging,
            rule_index_start: fw.rule_index_start,
            ipv4_rulesets: fw.ipv4_rulesets.clone(),
            ipv6_rulesets: fw.ipv6_rulesets.clone(),
            zone_pairs: fw.zone_pairs.clone(),
        })
    }

    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let s = &self.sync;
        if s.channel_capacity == 0 {
            return Err(invalid("sync.channel_capacity", "must be at least 1"));
        }
        Ok(SyncConfig {
            inactivity: Duration::from_millis(positive("sync.inactivity_ms", s.inactivity_ms)?),
            initial_delay: Duration::from_secs(s.initial_delay_secs),
            retry: Duration::from_secs(positive("sync.retry_secs", s.retry_secs)?),
            channel_capacity: s.channel_capacity,
        })
    }
}
