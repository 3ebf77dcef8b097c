// UniFi controller client modules
//
// Hand-written client for the slice of the controller API the bouncer needs:
// `rest/firewallgroup` and `rest/firewallrule` (legacy envelope) plus the
// v2 zone and zone-policy endpoints used by zone-based firewalls.

pub mod auth;
pub mod client;
pub mod firewall;
pub mod models;
pub mod zones;

pub use client::LegacyClient;
pub use models::{
    FirewallZone, LegacyFirewallGroup, LegacyFirewallRule, PolicyEndpoint, PolicyReorder,
    ZonePolicy,
};
