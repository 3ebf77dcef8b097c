// ── Firewall-controller seam ──
//
// The engine decides *what* group membership should be; implementations of
// `FirewallController` decide *how* it reaches a controller. Every write is
// either a full replace or a create guarded by the engine's caches, so a
// retry with the same arguments is always safe.

pub(crate) mod unifi;

#[cfg(test)]
pub(crate) mod mock;

pub use unifi::UnifiFirewall;

use std::future::Future;

use crate::error::CoreError;
use crate::model::{ControllerSnapshot, GroupSpec, PolicySpec, RuleSpec, ZonePairIds};

/// Operations the engine needs from a firewall controller.
pub trait FirewallController: Send + Sync {
    /// Whether the site runs the zone-based firewall.
    fn detect_zone_based(&self) -> impl Future<Output = Result<bool, CoreError>> + Send;

    /// Read groups plus rules (rules mode) or zones and policies (zones mode).
    fn load_snapshot(
        &self,
        zone_based: bool,
    ) -> impl Future<Output = Result<ControllerSnapshot, CoreError>> + Send;

    /// Create an address group; returns its controller id.
    fn create_group(
        &self,
        group: &GroupSpec,
    ) -> impl Future<Output = Result<String, CoreError>> + Send;

    /// Replace the full member list of an existing group.
    fn replace_group_members(
        &self,
        id: &str,
        group: &GroupSpec,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Create a drop rule for one group; returns its controller id.
    fn create_rule(&self, rule: &RuleSpec) -> impl Future<Output = Result<String, CoreError>> + Send;

    /// Create a zone block policy for one group; returns its controller id.
    fn create_policy(
        &self,
        policy: &PolicySpec,
    ) -> impl Future<Output = Result<String, CoreError>> + Send;

    /// Put `policy_ids` ahead of the predefined policies of a zone pair.
    fn reorder_policies(
        &self,
        pair: &ZonePairIds,
        policy_ids: &[String],
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}
