// ── Reconciliation ──
//
// Push dirty groups of one family. Every group is handled independently:
// a failure leaves that group dirty for the next flush and does not stop
// the remaining ones.

use tracing::{debug, info, warn};

use super::Engine;
use crate::error::CoreError;
use crate::firewall::FirewallController;
use crate::model::firewall::group_name;
use crate::model::{GroupSlot, GroupSpec, IpFamily};

/// Outcome of one reconciliation pass over a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub family: IpFamily,
    /// Groups whose member list reached the controller.
    pub pushed: usize,
    /// Of those, groups that did not exist remotely before.
    pub created: usize,
    /// Groups left dirty, with the error that stopped them.
    pub failed: Vec<(GroupSlot, String)>,
}

impl ReconcileReport {
    fn new(family: IpFamily) -> Self {
        Self {
            family,
            pushed: 0,
            created: 0,
            failed: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Pushed {
    Created,
    Replaced,
    /// Never created and now empty; nothing to send.
    Skipped,
}

impl<F: FirewallController> Engine<F> {
    /// Push every dirty group of `family` and ensure its wiring.
    ///
    /// Makes no controller call when nothing is dirty.
    pub async fn reconcile(&mut self, family: IpFamily) -> ReconcileReport {
        let mut report = ReconcileReport::new(family);
        let slots = self.store.groups().dirty_slots(family);
        let retired = self.store.groups().retired(family);
        if slots.is_empty() && retired.is_empty() {
            return report;
        }

        if let Err(e) = self.prepare_family(family).await {
            warn!(%family, error = %e, "firewall not prepared; deferring group push");
            let reason = e.to_string();
            report.failed = slots
                .into_iter()
                .chain(retired.iter().map(|(_, slot)| *slot))
                .map(|s| (s, reason.clone()))
                .collect();
            return report;
        }

        for slot in slots {
            let name = group_name(&self.config.group_prefix, family, slot);
            match self.push_group(family, slot, &name).await {
                Ok(Pushed::Created) => {
                    report.pushed += 1;
                    report.created += 1;
                }
                Ok(Pushed::Replaced) => report.pushed += 1,
                Ok(Pushed::Skipped) => {}
                Err(e) => {
                    warn!(group = %name, error = %e, "failed to push group; will retry");
                    report.failed.push((slot, e.to_string()));
                }
            }
        }

        // Duplicates are emptied only once their slot's members are on the
        // kept group, so merged addresses never drop out of the firewall.
        for (id, slot) in retired {
            let name = group_name(&self.config.group_prefix, family, slot);
            if report.failed.iter().any(|(s, _)| *s == slot) {
                continue;
            }
            match self.empty_retired(family, &id, &name).await {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    warn!(group = %name, %id, error = %e, "failed to empty duplicate group; will retry");
                    report.failed.push((slot, e.to_string()));
                }
            }
        }

        if report.pushed > 0 || !report.failed.is_empty() {
            info!(
                %family,
                pushed = report.pushed,
                created = report.created,
                failed = report.failed.len(),
                "reconciled address groups"
            );
        }
        report
    }

    async fn empty_retired(
        &mut self,
        family: IpFamily,
        id: &str,
        name: &str,
    ) -> Result<(), CoreError> {
        let spec = GroupSpec {
            name: name.to_owned(),
            family,
            members: Vec::new(),
        };
        self.controller.replace_group_members(id, &spec).await?;
        info!(group = %name, %id, "emptied duplicate address group");
        self.store.groups_mut().mark_retired_emptied(family, id);
        Ok(())
    }

    async fn push_group(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        name: &str,
    ) -> Result<Pushed, CoreError> {
        let Some(group) = self.store.groups().group(family, slot) else {
            return Ok(Pushed::Skipped);
        };
        let spec = GroupSpec {
            name: name.to_owned(),
            family,
            members: group.members().iter().map(ToString::to_string).collect(),
        };

        let (id, pushed) = match group.remote_id().map(str::to_owned) {
            Some(id) => {
                self.controller.replace_group_members(&id, &spec).await?;
                debug!(group = %name, members = spec.members.len(), "replaced group members");
                (id, Pushed::Replaced)
            }
            None if spec.members.is_empty() => {
                self.store.groups_mut().mark_pushed(family, slot);
                return Ok(Pushed::Skipped);
            }
            None => {
                let id = self.controller.create_group(&spec).await?;
                info!(group = %name, members = spec.members.len(), "created address group");
                self.store
                    .groups_mut()
                    .set_remote_id(family, slot, id.clone());
                (id, Pushed::Created)
            }
        };

        // Members are on the controller from here on; a wiring failure keeps
        // the group dirty so wiring is retried on the next flush.
        self.ensure_wiring(family, slot, &id).await?;
        self.store.groups_mut().mark_pushed(family, slot);
        Ok(pushed)
    }
}
