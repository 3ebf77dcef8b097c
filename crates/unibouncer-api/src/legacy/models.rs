// Controller response types
//
// Models for the firewall slice of the UniFi controller API. Legacy
// responses are wrapped in the `LegacyResponse<T>` envelope; v2 responses
// are bare. Fields use `#[serde(default)]` liberally because the API is
// inconsistent about field presence across firmware versions, and unknown
// fields land in `extra` so a read-modify-write never drops them.

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard UniFi legacy API response envelope.
///
/// ```json
/// { "meta": { "rc": "ok", "msg": "optional" }, "data": [...] }
/// ```
#[derive(Debug, Deserialize)]
pub struct LegacyResponse<T> {
    pub meta: Meta,
    pub data: Vec<T>,
}

/// Metadata from the legacy envelope. `rc` == `"ok"` means success.
#[derive(Debug, Deserialize)]
pub struct Meta {
    pub rc: String,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Firewall groups ──────────────────────────────────────────────────

/// `group_type` for IPv4 address groups.
pub const GROUP_TYPE_IPV4: &str = "address-group";
/// `group_type` for IPv6 address groups.
pub const GROUP_TYPE_IPV6: &str = "ipv6-address-group";

/// Firewall group from `rest/firewallgroup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyFirewallGroup {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// `address-group`, `ipv6-address-group`, or `port-group`.
    pub group_type: String,
    #[serde(default)]
    pub group_members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Firewall rules (pre-zone firewalls) ──────────────────────────────

/// Firewall rule from `rest/firewallrule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyFirewallRule {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// `drop`, `reject`, or `accept`.
    #[serde(default)]
    pub action: String,
    /// e.g. `WAN_IN`, `WAN_LOCAL`, `WANv6_IN`.
    #[serde(default)]
    pub ruleset: String,
    #[serde(default)]
    pub rule_index: u32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub src_firewallgroup_ids: Vec<String>,
    #[serde(default)]
    pub dst_firewallgroup_ids: Vec<String>,
    /// `NETv4` or `NETv6`.
    #[serde(default)]
    pub src_networkconf_type: String,
    #[serde(default)]
    pub dst_networkconf_type: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Zones & zone policies (v2) ───────────────────────────────────────

/// Firewall zone from `v2/api/site/{site}/firewall/zone`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallZone {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub zone_key: Option<String>,
    #[serde(default)]
    pub network_ids: Vec<String>,
}

/// One side (source or destination) of a zone policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEndpoint {
    pub zone_id: String,
    /// `ANY`, `IP`, `NETWORK`, ...
    pub matching_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_matching_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Zone-based firewall policy from `v2/api/site/{site}/firewall-policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonePolicy {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// `ALLOW`, `BLOCK`, or `REJECT`.
    pub action: String,
    /// `IPV4`, `IPV6`, or `BOTH`.
    #[serde(default)]
    pub ip_version: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub predefined: bool,
    #[serde(default)]
    pub protocol: Option<String>,
    pub source: PolicyEndpoint,
    pub destination: PolicyEndpoint,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `PUT firewall-policies/batch-reorder`.
///
/// Reorders the user-defined policies of one zone pair. Policies listed in
/// `before_predefined_ids` are evaluated ahead of the built-in ones.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReorder {
    pub source_zone_id: String,
    pub destination_zone_id: String,
    pub before_predefined_ids: Vec<String>,
    pub after_predefined_ids: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn firewall_group_keeps_unknown_fields() {
        let raw = json!({
            "_id": "g1",
            "name": "cs-unibouncer-ipv4-0",
            "group_type": "address-group",
            "group_members": ["1.2.3.4"],
            "site_id": "s1",
            "external_id": "x"
        });
        let group: LegacyFirewallGroup = serde_json::from_value(raw).unwrap();
        assert_eq!(group.group_members, vec!["1.2.3.4"]);
        assert_eq!(group.extra.get("external_id"), Some(&json!("x")));

        let back = serde_json::to_value(&group).unwrap();
        assert_eq!(back["external_id"], "x");
        assert_eq!(back["_id"], "g1");
    }

    #[test]
    fn new_group_serializes_without_id() {
        let group = LegacyFirewallGroup {
            id: None,
            name: "g".into(),
            group_type: GROUP_TYPE_IPV6.into(),
            group_members: vec!["2001:db8::/32".into()],
            site_id: None,
            extra: serde_json::Map::new(),
        };
        let value = serde_json::to_value(&group).unwrap();
        assert!(value.get("_id").is_none());
        assert_eq!(value["group_type"], "ipv6-address-group");
    }

    #[test]
    fn zone_policy_parses_minimal_shape() {
        let raw = json!({
            "_id": "p1",
            "name": "Block Invalid",
            "action": "BLOCK",
            "predefined": true,
            "source": { "zone_id": "z1", "matching_target": "ANY" },
            "destination": { "zone_id": "z2", "matching_target": "ANY" }
        });
        let policy: ZonePolicy = serde_json::from_value(raw).unwrap();
        assert!(policy.predefined);
        assert_eq!(policy.source.zone_id, "z1");
        assert!(policy.source.ip_group_id.is_none());
    }
}
