// ── UniFi implementation of the firewall-controller seam ──

use std::future::Future;

use secrecy::SecretString;
use serde_json::json;
use tracing::{debug, info, warn};

use unibouncer_api::legacy::models::{GROUP_TYPE_IPV4, GROUP_TYPE_IPV6};
use unibouncer_api::transport::{TlsMode, TransportConfig};
use unibouncer_api::{
    LegacyClient, LegacyFirewallGroup, LegacyFirewallRule, PolicyEndpoint, PolicyReorder,
    ZonePolicy,
};

use super::FirewallController;
use crate::config::{AuthCredentials, ControllerConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{
    ControllerSnapshot, GroupSpec, IpFamily, PolicySpec, RemoteGroup, RemoteRule, RemoteZone,
    RuleSpec, ZonePairIds,
};

/// Username and password kept for renewing an expired session.
struct Session {
    username: String,
    password: SecretString,
}

/// Firewall controller backed by a UniFi Network application.
pub struct UnifiFirewall {
    client: LegacyClient,
    session: Option<Session>,
}

impl UnifiFirewall {
    /// Wrap an already authenticated client. Without session credentials
    /// an expired session is reported as an authentication failure.
    pub fn new(client: LegacyClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Detect the platform, authenticate, and wrap the resulting client.
    pub async fn connect(config: &ControllerConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config.tls, config.timeout);

        let platform = LegacyClient::detect_platform(&config.url, &transport).await?;
        debug!(?platform, "detected controller platform");

        let (client, session) = match &config.auth {
            AuthCredentials::ApiKey(key) => {
                let client = LegacyClient::from_api_key(
                    config.url.clone(),
                    config.site.clone(),
                    platform,
                    key,
                    &transport,
                )?;
                (client, None)
            }
            AuthCredentials::Credentials { username, password } => {
                let client = LegacyClient::new(
                    config.url.clone(),
                    config.site.clone(),
                    platform,
                    &transport,
                )?;
                client.login(username, password).await?;
                let session = Session {
                    username: username.clone(),
                    password: password.clone(),
                };
                (client, Some(session))
            }
        };

        info!(url = %config.url, site = %config.site, "connected to controller");
        Ok(Self { client, session })
    }

    pub fn client(&self) -> &LegacyClient {
        &self.client
    }

    /// Log out of a password session. API-key clients have nothing to close.
    pub async fn close(&self) -> Result<(), CoreError> {
        if self.session.is_some() {
            self.client.logout().await?;
        }
        Ok(())
    }

    /// Run `call`, logging in again and retrying once if the session has
    /// expired underneath it.
    async fn renewing<T, Fut>(&self, call: impl Fn() -> Fut) -> Result<T, CoreError>
    where
        Fut: Future<Output = Result<T, unibouncer_api::Error>>,
    {
        match call().await {
            Err(e) if e.is_auth_expired() => {
                let Some(session) = &self.session else {
                    return Err(e.into());
                };
                warn!("controller session expired; logging in again");
                self.client
                    .login(&session.username, &session.password)
                    .await?;
                Ok(call().await?)
            }
            other => Ok(other?),
        }
    }
}

/// Translate core TLS settings into an API-level transport config.
pub(crate) fn build_transport(
    tls: &TlsVerification,
    timeout: std::time::Duration,
) -> TransportConfig {
    TransportConfig {
        tls: match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout,
    }
}

fn group_type(family: IpFamily) -> &'static str {
    match family {
        IpFamily::V4 => GROUP_TYPE_IPV4,
        IpFamily::V6 => GROUP_TYPE_IPV6,
    }
}

fn to_legacy_group(group: &GroupSpec) -> LegacyFirewallGroup {
    LegacyFirewallGroup {
        id: None,
        name: group.name.clone(),
        group_type: group_type(group.family).into(),
        group_members: group.members.clone(),
        site_id: None,
        extra: serde_json::Map::new(),
    }
}

fn require_id(id: Option<String>, what: &str) -> Result<String, CoreError> {
    id.ok_or_else(|| CoreError::Api {
        message: format!("controller returned {what} without an id"),
        status: None,
        transient: false,
    })
}

fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

impl FirewallController for UnifiFirewall {
    async fn detect_zone_based(&self) -> Result<bool, CoreError> {
        match self.renewing(|| self.client.list_firewall_zones()).await {
            Ok(zones) => Ok(!zones.is_empty()),
            // Sites that predate zones answer 4xx on the v2 zone path.
            Err(CoreError::Api {
                status: Some(status),
                ..
            }) if status < 500 => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn load_snapshot(&self, zone_based: bool) -> Result<ControllerSnapshot, CoreError> {
        let groups = self
            .renewing(|| self.client.list_firewall_groups())
            .await?
            .into_iter()
            .filter_map(|g| {
                let family = match g.group_type.as_str() {
                    GROUP_TYPE_IPV4 => IpFamily::V4,
                    GROUP_TYPE_IPV6 => IpFamily::V6,
                    _ => return None,
                };
                Some(RemoteGroup {
                    id: g.id?,
                    name: g.name,
                    family,
                    members: g.group_members,
                })
            })
            .collect();

        let mut snapshot = ControllerSnapshot {
            groups,
            ..ControllerSnapshot::default()
        };

        if zone_based {
            snapshot.zones = self
                .renewing(|| self.client.list_firewall_zones())
                .await?
                .into_iter()
                .map(|z| RemoteZone {
                    id: z.id,
                    name: z.name,
                })
                .collect();
            snapshot.policies = self
                .renewing(|| self.client.list_zone_policies())
                .await?
                .into_iter()
                .filter(|p| !p.predefined)
                .filter_map(|p| Some(RemoteRule { id: p.id?, name: p.name }))
                .collect();
        } else {
            snapshot.rules = self
                .renewing(|| self.client.list_firewall_rules())
                .await?
                .into_iter()
                .filter_map(|r| Some(RemoteRule { id: r.id?, name: r.name }))
                .collect();
        }

        Ok(snapshot)
    }

    async fn create_group(&self, group: &GroupSpec) -> Result<String, CoreError> {
        let body = to_legacy_group(group);
        let created = self
            .renewing(|| self.client.create_firewall_group(&body))
            .await?;
        require_id(created.id, "firewall group")
    }

    async fn replace_group_members(&self, id: &str, group: &GroupSpec) -> Result<(), CoreError> {
        let mut body = to_legacy_group(group);
        body.id = Some(id.to_owned());
        self.renewing(|| self.client.update_firewall_group(id, &body))
            .await?;
        Ok(())
    }

    async fn create_rule(&self, rule: &RuleSpec) -> Result<String, CoreError> {
        let net_type = match rule.family {
            IpFamily::V4 => "NETv4",
            IpFamily::V6 => "NETv6",
        };
        let body = LegacyFirewallRule {
            id: None,
            name: rule.name.clone(),
            enabled: true,
            action: "drop".into(),
            ruleset: rule.ruleset.clone(),
            rule_index: rule.rule_index,
            protocol: "all".into(),
            logging: rule.logging,
            src_firewallgroup_ids: vec![rule.group_id.clone()],
            dst_firewallgroup_ids: Vec::new(),
            src_networkconf_type: net_type.into(),
            dst_networkconf_type: net_type.into(),
            extra: object(json!({
                "protocol_match_excepted": false,
                "src_address": "",
                "src_mac_address": "",
                "dst_address": "",
                "state_established": false,
                "state_invalid": false,
                "state_new": false,
                "state_related": false,
                "ipsec": "",
            })),
        };
        let created = self
            .renewing(|| self.client.create_firewall_rule(&body))
            .await?;
        require_id(created.id, "firewall rule")
    }

    async fn create_policy(&self, policy: &PolicySpec) -> Result<String, CoreError> {
        let ip_version = match policy.family {
            IpFamily::V4 => "IPV4",
            IpFamily::V6 => "IPV6",
        };
        let body = ZonePolicy {
            id: None,
            name: policy.name.clone(),
            enabled: true,
            action: "BLOCK".into(),
            ip_version: Some(ip_version.into()),
            index: None,
            logging: policy.logging,
            predefined: false,
            protocol: Some("all".into()),
            source: PolicyEndpoint {
                zone_id: policy.source_zone_id.clone(),
                matching_target: "IP".into(),
                matching_target_type: Some("OBJECT".into()),
                ip_group_id: Some(policy.group_id.clone()),
                port_matching_type: Some("ANY".into()),
                extra: serde_json::Map::new(),
            },
            destination: PolicyEndpoint {
                zone_id: policy.destination_zone_id.clone(),
                matching_target: "ANY".into(),
                matching_target_type: None,
                ip_group_id: None,
                port_matching_type: Some("ANY".into()),
                extra: serde_json::Map::new(),
            },
            extra: object(json!({
                "create_allow_respond": false,
                "connection_state_type": "ALL",
                "connection_states": [],
                "match_ip_sec": false,
                "match_opposite_protocol": false,
                "icmp_typename": "ANY",
                "icmp_v6_typename": "ANY",
                "schedule": { "mode": "ALWAYS" },
            })),
        };
        let created = self
            .renewing(|| self.client.create_zone_policy(&body))
            .await?;
        require_id(created.id, "zone policy")
    }

    async fn reorder_policies(
        &self,
        pair: &ZonePairIds,
        policy_ids: &[String],
    ) -> Result<(), CoreError> {
        let body = PolicyReorder {
            source_zone_id: pair.source_zone_id.clone(),
            destination_zone_id: pair.destination_zone_id.clone(),
            before_predefined_ids: policy_ids.to_vec(),
            after_predefined_ids: Vec::new(),
        };
        self.renewing(|| self.client.reorder_zone_policies(&body))
            .await
    }
}
