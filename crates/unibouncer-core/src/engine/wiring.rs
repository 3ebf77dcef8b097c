// ── Firewall wiring ──
//
// Rules (rules mode) or zone policies (zones mode) that make a group
// actually block traffic. Created at most once per group slot; the cache
// is seeded from the controller snapshot so restarts never duplicate them.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use super::Engine;
use crate::config::ZonePair;
use crate::error::CoreError;
use crate::firewall::FirewallController;
use crate::model::firewall::{policy_name, rule_name};
use crate::model::{GroupSlot, IpFamily, PolicySpec, RemoteRule, RemoteZone, RuleSpec, ZonePairIds};

/// Names and ids of bouncer-owned rules, policies, and all known zones.
#[derive(Debug, Default, Clone)]
pub struct WiringCache {
    rules: HashMap<String, String>,
    /// Sorted so reorder requests list policies deterministically.
    policies: BTreeMap<String, String>,
    zones: HashMap<String, String>,
    /// Zone pairs holding a policy that still has to be moved ahead of the
    /// predefined ones.
    unordered: HashSet<ZonePairIds>,
}

impl WiringCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a snapshot, keeping only rules and policies under `prefix`.
    pub(crate) fn load(
        &mut self,
        prefix: &str,
        rules: Vec<RemoteRule>,
        policies: Vec<RemoteRule>,
        zones: Vec<RemoteZone>,
    ) {
        let owned = |name: &str| {
            name.strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('-'))
        };
        self.rules.extend(
            rules
                .into_iter()
                .filter(|r| owned(&r.name))
                .map(|r| (r.name, r.id)),
        );
        self.policies.extend(
            policies
                .into_iter()
                .filter(|p| owned(&p.name))
                .map(|p| (p.name, p.id)),
        );
        self.zones
            .extend(zones.into_iter().map(|z| (z.name, z.id)));
    }

    pub fn rule_id(&self, name: &str) -> Option<&str> {
        self.rules.get(name).map(String::as_str)
    }

    pub fn policy_id(&self, name: &str) -> Option<&str> {
        self.policies.get(name).map(String::as_str)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Resolve a configured zone pair by zone name.
    pub fn zone_pair_ids(&self, pair: &ZonePair) -> Result<ZonePairIds, CoreError> {
        let lookup = |name: &str| {
            self.zones.get(name).cloned().ok_or_else(|| CoreError::Bootstrap {
                message: format!("firewall zone '{name}' not found on controller"),
            })
        };
        Ok(ZonePairIds {
            source_zone_id: lookup(&pair.source)?,
            destination_zone_id: lookup(&pair.destination)?,
        })
    }

    /// Ids of every bouncer policy wired into `pair`, both families.
    pub fn pair_policy_ids(&self, prefix: &str, pair: &ZonePair) -> Vec<String> {
        let pair_prefix = format!("{prefix}-{}-{}-", pair.source, pair.destination);
        self.policies
            .iter()
            .filter(|(name, _)| name.starts_with(&pair_prefix))
            .map(|(_, id)| id.clone())
            .collect()
    }
}

impl<F: FirewallController> Engine<F> {
    /// Make sure the group at `slot` is referenced by its rules or policies.
    pub(crate) async fn ensure_wiring(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        group_id: &str,
    ) -> Result<(), CoreError> {
        if self.zone_based {
            self.ensure_policies(family, slot, group_id).await
        } else {
            self.ensure_rules(family, slot, group_id).await
        }
    }

    async fn ensure_rules(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        group_id: &str,
    ) -> Result<(), CoreError> {
        let rulesets = match family {
            IpFamily::V4 => &self.config.ipv4_rulesets,
            IpFamily::V6 => &self.config.ipv6_rulesets,
        };

        for ruleset in rulesets {
            let name = rule_name(&self.config.group_prefix, ruleset, slot);
            if self.wiring.rules.contains_key(&name) {
                continue;
            }
            let spec = RuleSpec {
                name,
                family,
                ruleset: ruleset.clone(),
                rule_index: self.config.rule_index_start.saturating_add(slot),
                group_id: group_id.to_owned(),
                logging: self.config.logging,
            };
            let id = self.controller.create_rule(&spec).await?;
            info!(rule = %spec.name, %ruleset, index = spec.rule_index, "created firewall rule");
            self.wiring.rules.insert(spec.name, id);
        }
        Ok(())
    }

    async fn ensure_policies(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        group_id: &str,
    ) -> Result<(), CoreError> {
        let prefix = &self.config.group_prefix;

        for pair in &self.config.zone_pairs {
            let ids = self.wiring.zone_pair_ids(pair)?;
            let name = policy_name(prefix, &pair.source, &pair.destination, family, slot);

            if !self.wiring.policies.contains_key(&name) {
                let spec = PolicySpec {
                    name,
                    family,
                    source_zone_id: ids.source_zone_id.clone(),
                    destination_zone_id: ids.destination_zone_id.clone(),
                    group_id: group_id.to_owned(),
                    logging: self.config.logging,
                };
                let id = self.controller.create_policy(&spec).await?;
                info!(
                    policy = %spec.name,
                    source = %pair.source,
                    destination = %pair.destination,
                    "created zone policy"
                );
                self.wiring.policies.insert(spec.name, id);
                self.wiring.unordered.insert(ids.clone());
            }

            if self.wiring.unordered.contains(&ids) {
                let ordered = self.wiring.pair_policy_ids(prefix, pair);
                self.controller.reorder_policies(&ids, &ordered).await?;
                self.wiring.unordered.remove(&ids);
                debug!(
                    count = ordered.len(),
                    source = %pair.source,
                    destination = %pair.destination,
                    "reordered zone policies"
                );
            }
        }
        Ok(())
    }
}
