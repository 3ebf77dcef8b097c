// ── Firewall-controller domain types ──
//
// What the engine reads from and writes to the controller, independent of
// the UniFi wire models in `unibouncer-api`.

use super::family::IpFamily;

/// Index of a group inside its family (`cs-unibouncer-ipv4-3` is slot 3).
pub type GroupSlot = u32;

/// Controller name of the group at `slot`.
pub fn group_name(prefix: &str, family: IpFamily, slot: GroupSlot) -> String {
    format!("{prefix}-{family}-{slot}")
}

/// Inverse of [`group_name`]; `None` for groups this bouncer does not own.
pub fn parse_group_name(prefix: &str, name: &str) -> Option<(IpFamily, GroupSlot)> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    let (family, slot) = rest.split_once('-')?;
    let family = IpFamily::all().find(|f| f.to_string() == family)?;
    let slot = slot.parse().ok()?;
    Some((family, slot))
}

/// Controller name of the rule wiring `slot` into `ruleset`.
pub fn rule_name(prefix: &str, ruleset: &str, slot: GroupSlot) -> String {
    format!("{prefix}-{ruleset}-{slot}")
}

/// Controller name of the zone policy wiring `slot` into a zone pair.
pub fn policy_name(
    prefix: &str,
    source: &str,
    destination: &str,
    family: IpFamily,
    slot: GroupSlot,
) -> String {
    format!("{prefix}-{source}-{destination}-{family}-{slot}")
}

// ── Snapshot (bootstrap read) ───────────────────────────────────────

/// An address group as it exists on the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGroup {
    pub id: String,
    pub name: String,
    pub family: IpFamily,
    pub members: Vec<String>,
}

/// A firewall rule or zone policy, reduced to what the wiring cache needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRule {
    pub id: String,
    pub name: String,
}

/// A firewall zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteZone {
    pub id: String,
    pub name: String,
}

/// Everything the engine loads at startup so a restart does not clobber
/// state it created earlier. Rules and zones are empty when the
/// corresponding firewall model is not in use.
#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    pub groups: Vec<RemoteGroup>,
    pub rules: Vec<RemoteRule>,
    pub zones: Vec<RemoteZone>,
    pub policies: Vec<RemoteRule>,
}

// ── Write requests ──────────────────────────────────────────────────

/// Desired state of one address group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub name: String,
    pub family: IpFamily,
    pub members: Vec<String>,
}

/// A drop rule matching one address group as source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: String,
    pub family: IpFamily,
    pub ruleset: String,
    pub rule_index: u32,
    pub group_id: String,
    pub logging: bool,
}

/// A block policy between two zones matching one address group as source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: String,
    pub family: IpFamily,
    pub source_zone_id: String,
    pub destination_zone_id: String,
    pub group_id: String,
    pub logging: bool,
}

/// Resolved ids of a configured zone pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZonePairIds {
    pub source_zone_id: String,
    pub destination_zone_id: String,
}
