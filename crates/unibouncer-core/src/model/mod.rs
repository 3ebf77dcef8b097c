// ── Domain model ──

pub mod address;
pub mod decision;
pub mod family;
pub mod firewall;

pub use address::{BlockedAddress, InvalidAddress};
pub use decision::{Decision, DecisionAction, SkippedDecision};
pub use family::{IpFamily, PerFamily};
pub use firewall::{
    ControllerSnapshot, GroupSlot, GroupSpec, PolicySpec, RemoteGroup, RemoteRule, RemoteZone,
    RuleSpec, ZonePairIds,
};
