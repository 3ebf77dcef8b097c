// ── Bootstrap ──
//
// Resolve the firewall model, read back everything a previous run left on
// the controller, and prepare zone ordering. Errors here are fatal.

use tracing::{debug, info, warn};

use super::Engine;
use crate::config::FirewallMode;
use crate::error::CoreError;
use crate::firewall::FirewallController;
use crate::model::firewall::parse_group_name;
use crate::model::{ControllerSnapshot, IpFamily};

impl<F: FirewallController> Engine<F> {
    /// Connect the engine to the controller state.
    ///
    /// Detects the firewall model when configured as `auto`, then seeds the
    /// block store and wiring cache from a controller snapshot so that
    /// objects created by an earlier run are reused.
    pub async fn bootstrap(
        controller: F,
        config: crate::config::EngineConfig,
    ) -> Result<Self, CoreError> {
        let zone_based = match config.mode {
            FirewallMode::Rules => false,
            FirewallMode::Zones => true,
            FirewallMode::Auto => controller
                .detect_zone_based()
                .await
                .map_err(|e| CoreError::bootstrap("detecting firewall model", e))?,
        };
        info!(
            model = if zone_based { "zones" } else { "rules" },
            "firewall model resolved"
        );

        let snapshot = controller
            .load_snapshot(zone_based)
            .await
            .map_err(|e| CoreError::bootstrap("reading controller state", e))?;

        let mut engine = Self::new(controller, config, zone_based);
        engine.load(snapshot);
        Ok(engine)
    }

    /// Seed the caches from a snapshot. Groups are loaded by ascending slot
    /// so that an address duplicated across groups stays in the lowest one.
    pub(crate) fn load(&mut self, snapshot: ControllerSnapshot) {
        let prefix = self.config.group_prefix.clone();

        let mut owned: Vec<_> = snapshot
            .groups
            .into_iter()
            .filter_map(|g| {
                let (family, slot) = parse_group_name(&prefix, &g.name)?;
                if family != g.family {
                    warn!(group = %g.name, "group type does not match its name; ignoring");
                    return None;
                }
                Some((family, slot, g))
            })
            .filter(|(family, _, g)| {
                let managed = *family == IpFamily::V4 || self.config.ipv6_enabled;
                if !managed {
                    debug!(group = %g.name, "IPv6 disabled; leaving group untouched");
                }
                managed
            })
            .collect();
        owned.sort_by_key(|(family, slot, _)| (*family, *slot));

        for (family, slot, group) in owned {
            self.store.load_group(family, slot, group.id, &group.members);
        }

        self.wiring
            .load(&prefix, snapshot.rules, snapshot.policies, snapshot.zones);

        for family in self.families() {
            info!(
                %family,
                groups = self.store.groups().group_count(family),
                addresses = self.store.addresses().len(family),
                "loaded existing bouncer groups"
            );
        }
        debug!(
            rules = self.wiring.rule_count(),
            policies = self.wiring.policy_count(),
            "loaded existing firewall wiring"
        );
    }

    /// One-time preparation of a family before its first write.
    ///
    /// In zones mode, every configured zone pair must resolve, and existing
    /// bouncer policies are moved ahead of the predefined ones. In rules
    /// mode there is nothing to prepare. Success latches per family.
    pub(crate) async fn prepare_family(&mut self, family: IpFamily) -> Result<(), CoreError> {
        if self.prepared[family] {
            return Ok(());
        }

        if self.zone_based {
            let prefix = &self.config.group_prefix;
            for pair in &self.config.zone_pairs {
                let ids = self.wiring.zone_pair_ids(pair)?;
                let ordered = self.wiring.pair_policy_ids(prefix, pair);
                if ordered.is_empty() {
                    continue;
                }
                self.controller
                    .reorder_policies(&ids, &ordered)
                    .await
                    .map_err(|e| {
                        CoreError::bootstrap(
                            &format!("ordering policies {} -> {}", pair.source, pair.destination),
                            e,
                        )
                    })?;
                debug!(
                    source = %pair.source,
                    destination = %pair.destination,
                    count = ordered.len(),
                    "moved bouncer policies ahead of predefined ones"
                );
            }
        }

        self.prepared[family] = true;
        debug!(%family, "family prepared");
        Ok(())
    }
}
