// ── Runtime configuration ──
//
// These types describe *how* to reach the controller and the LAPI and how
// the engine lays out groups. They carry credential data and tuning, but
// never touch disk. `unibouncer-config` constructs them and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Controller credentials.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Local API key sent as `X-API-KEY` (UniFi OS, Network 9.0+).
    ApiKey(SecretString),
    /// Username/password session; kept for logging in again on expiry.
    Credentials {
        username: String,
        password: SecretString,
    },
}

/// Which server certificates a client trusts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    SystemDefaults,
    /// PEM bundle for a privately issued certificate.
    CustomCa(std::path::PathBuf),
    /// Accept anything. Consoles ship with self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Where the managed firewall lives.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Console or Network application root, e.g. `https://192.168.1.1`.
    pub url: Url,
    pub auth: AuthCredentials,
    /// Site name as it appears in API paths (usually "default").
    pub site: String,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Connection and polling settings for the CrowdSec LAPI.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: Url,
    pub api_key: SecretString,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Delay between two stream pulls.
    pub update_interval: Duration,
    /// Only pull decisions from these origins (empty = all).
    pub origins: Vec<String>,
    /// Only pull decisions with these scopes (empty = LAPI default).
    pub scopes: Vec<String>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// Which firewall model the controller site uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallMode {
    /// Probe the controller: zones when the site exposes any.
    #[default]
    Auto,
    /// Pre-9.x rule sets (`WAN_IN`, `WAN_LOCAL`, ...).
    Rules,
    /// Zone-based firewall with zone-pair policies.
    Zones,
}

/// How a new address picks its group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupSelection {
    /// Group with the fewest members among those with room.
    #[default]
    LeastLoaded,
    /// Lowest slot with room.
    FirstFit,
}

/// A zone pair whose traffic is blocked for bouncer groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePair {
    pub source: String,
    pub destination: String,
}

/// Group layout and wiring settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: FirewallMode,
    pub ipv6_enabled: bool,
    /// Maximum members per address group.
    pub max_group_size: usize,
    pub group_selection: GroupSelection,
    /// Name prefix of every object the bouncer owns on the controller.
    pub group_prefix: String,
    /// Enable logging on created rules and policies.
    pub logging: bool,
    /// Rule index of slot 0 in every ruleset (rules mode).
    pub rule_index_start: u32,
    pub ipv4_rulesets: Vec<String>,
    pub ipv6_rulesets: Vec<String>,
    pub zone_pairs: Vec<ZonePair>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: FirewallMode::Auto,
            ipv6_enabled: true,
            max_group_size: 10_000,
            group_selection: GroupSelection::LeastLoaded,
            group_prefix: "cs-unibouncer".into(),
            logging: false,
            rule_index_start: 22_000,
            ipv4_rulesets: vec!["WAN_IN".into(), "WAN_LOCAL".into()],
            ipv6_rulesets: vec!["WANv6_IN".into(), "WANv6_LOCAL".into()],
            zone_pairs: vec![
                ZonePair {
                    source: "External".into(),
                    destination: "Internal".into(),
                },
                ZonePair {
                    source: "External".into(),
                    destination: "Gateway".into(),
                },
            ],
        }
    }
}

/// Timing of the synchronization loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last batch before a flush.
    pub inactivity: Duration,
    /// Delay of the first flush after startup (the startup pull is large).
    pub initial_delay: Duration,
    /// Delay before retrying a flush that left groups dirty.
    pub retry: Duration,
    /// Capacity of the decision batch channel.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            inactivity: Duration::from_secs(1),
            initial_delay: Duration::from_secs(10),
            retry: Duration::from_secs(30),
            channel_capacity: 16,
        }
    }
}
