// ── Block store ──
//
// The address cache and the group tracker, kept consistent with each
// other: every cached address is a member of exactly the group its entry
// names, and every group member has a cache entry.

mod address_cache;
mod groups;

pub use address_cache::AddressCache;
pub use groups::{FirewallGroup, GroupTracker};

use tracing::{debug, warn};

use crate::config::GroupSelection;
use crate::model::{BlockedAddress, Decision, DecisionAction, GroupSlot, IpFamily};

/// Blocked addresses and their group assignment, for both families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStore {
    addresses: AddressCache,
    groups: GroupTracker,
    capacity: usize,
    selection: GroupSelection,
}

impl BlockStore {
    pub fn new(capacity: usize, selection: GroupSelection) -> Self {
        Self {
            addresses: AddressCache::new(),
            groups: GroupTracker::new(),
            capacity: capacity.max(1),
            selection,
        }
    }

    pub fn addresses(&self) -> &AddressCache {
        &self.addresses
    }

    pub fn groups(&self) -> &GroupTracker {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut GroupTracker {
        &mut self.groups
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply one decision. Returns `true` if any group membership changed.
    pub fn apply(&mut self, decision: &Decision) -> bool {
        match decision.action {
            DecisionAction::Add => self.block(decision.address),
            DecisionAction::Remove => self.unblock(&decision.address),
        }
    }

    fn block(&mut self, address: BlockedAddress) -> bool {
        let family = address.family();

        if let Some(current) = self.addresses.slot_of(&address) {
            let over = self
                .groups
                .group(family, current)
                .is_some_and(|g| g.len() > self.capacity);
            if !over {
                return false;
            }
            // Oversized group loaded from the controller: move the address
            // somewhere with room.
            self.groups.remove_member(family, current, &address);
            let target = self.groups.select_slot(family, self.capacity, self.selection);
            debug!(%address, from = current, to = target, "rebalancing address");
            self.groups.add_member(family, target, address);
            self.addresses.assign(address, target);
            return true;
        }

        let slot = self.groups.select_slot(family, self.capacity, self.selection);
        self.groups.add_member(family, slot, address);
        self.addresses.assign(address, slot);
        true
    }

    fn unblock(&mut self, address: &BlockedAddress) -> bool {
        let Some(slot) = self.addresses.remove(address) else {
            return false;
        };
        self.groups.remove_member(address.family(), slot, address);
        true
    }

    /// Register a group read from the controller at startup.
    ///
    /// Members that do not parse, or that an earlier group already holds,
    /// are dropped from the model and the group is marked for a push. A
    /// second group with the same slot is folded into the first one.
    pub fn load_group(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        remote_id: String,
        raw_members: &[String],
    ) {
        let mut stale = false;
        let mut members = Vec::with_capacity(raw_members.len());

        for raw in raw_members {
            match raw.parse::<BlockedAddress>() {
                Ok(address) if address.family() != family => {
                    warn!(%address, slot, %family, "group member of the wrong family; dropping");
                    stale = true;
                }
                Ok(address) if self.addresses.contains(&address) => {
                    debug!(%address, slot, "address already loaded from another group; dropping");
                    stale = true;
                }
                Ok(address) => {
                    self.addresses.assign(address, slot);
                    members.push(address);
                }
                Err(e) => {
                    warn!(error = %e, slot, %family, "unparsable group member; dropping");
                    stale = true;
                }
            }
        }

        if self.groups.group(family, slot).is_some() {
            warn!(
                slot,
                %family,
                id = %remote_id,
                "duplicate controller group for one slot; merging its members and emptying it"
            );
        }
        self.groups
            .insert_loaded(family, slot, remote_id, members, stale);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> BlockedAddress {
        s.parse().unwrap()
    }

    fn add(s: &str) -> Decision {
        Decision::add(addr(s), "crowdsec")
    }

    fn remove(s: &str) -> Decision {
        Decision::remove(addr(s), "crowdsec")
    }

    fn members(store: &BlockStore, family: IpFamily, slot: GroupSlot) -> Vec<String> {
        store
            .groups()
            .group(family, slot)
            .map(|g| g.members().iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn add_is_idempotent() {
        let mut once = BlockStore::new(10, GroupSelection::LeastLoaded);
        once.apply(&add("1.2.3.4"));

        let mut twice = once.clone();
        assert!(!twice.apply(&add("1.2.3.4")));
        assert_eq!(once, twice);
    }

    #[test]
    fn add_then_remove_restores_prior_state() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        store.apply(&add("9.9.9.9"));
        store.groups_mut().mark_pushed(IpFamily::V4, 0);
        let before = store.clone();

        store.apply(&add("1.2.3.4"));
        store.apply(&remove("1.2.3.4"));
        assert_eq!(store, before);

        // Also from a completely empty store.
        let empty = BlockStore::new(10, GroupSelection::LeastLoaded);
        let mut store = empty.clone();
        store.apply(&add("1.2.3.4"));
        store.apply(&remove("1.2.3.4"));
        assert_eq!(store, empty);
    }

    #[test]
    fn batch_order_decides_presence() {
        let mut present = BlockStore::new(10, GroupSelection::LeastLoaded);
        for d in [remove("1.2.3.4"), add("1.2.3.4")] {
            present.apply(&d);
        }
        assert!(present.addresses().contains(&addr("1.2.3.4")));

        let mut absent = BlockStore::new(10, GroupSelection::LeastLoaded);
        for d in [add("1.2.3.4"), remove("1.2.3.4")] {
            absent.apply(&d);
        }
        assert!(!absent.addresses().contains(&addr("1.2.3.4")));
    }

    #[test]
    fn families_do_not_interfere() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        store.apply(&add("1.2.3.4"));
        store.groups_mut().mark_pushed(IpFamily::V4, 0);
        let v4_groups = store.groups().groups(IpFamily::V4).cloned().collect::<Vec<_>>();

        store.apply(&add("2001:db8::1"));
        store.apply(&remove("2001:db8::1"));
        store.apply(&add("2001:db8::/32"));

        assert_eq!(store.addresses().len(IpFamily::V4), 1);
        assert!(!store.groups().is_dirty(IpFamily::V4));
        assert_eq!(
            store.groups().groups(IpFamily::V4).cloned().collect::<Vec<_>>(),
            v4_groups
        );
        assert_eq!(store.groups().dirty_slots(IpFamily::V6), vec![0]);
    }

    #[test]
    fn bin_packing_fills_ceil_n_over_c_groups() {
        let capacity = 3;
        let mut store = BlockStore::new(capacity, GroupSelection::LeastLoaded);
        for i in 1..=10 {
            store.apply(&add(&format!("10.0.0.{i}")));
        }

        let groups: Vec<_> = store.groups().groups(IpFamily::V4).collect();
        assert_eq!(groups.len(), 4); // ceil(10 / 3)
        assert!(groups.iter().all(|g| g.len() <= capacity));
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), 10);
    }

    #[test]
    fn scenario_add_add_remove() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        for d in [add("1.2.3.4"), add("5.6.7.8"), remove("1.2.3.4")] {
            store.apply(&d);
        }

        let cached: Vec<String> = store
            .addresses()
            .addresses(IpFamily::V4)
            .map(ToString::to_string)
            .collect();
        assert_eq!(cached, vec!["5.6.7.8"]);
        assert_eq!(store.groups().dirty_slots(IpFamily::V4), vec![0]);
        assert_eq!(members(&store, IpFamily::V4, 0), vec!["5.6.7.8"]);
    }

    #[test]
    fn load_group_drops_duplicates_and_garbage() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        store.load_group(IpFamily::V4, 0, "g0".into(), &["1.1.1.1".into()]);
        store.load_group(
            IpFamily::V4,
            1,
            "g1".into(),
            &["1.1.1.1".into(), "bogus".into(), "2.2.2.2".into()],
        );

        assert_eq!(store.addresses().slot_of(&addr("1.1.1.1")), Some(0));
        assert_eq!(members(&store, IpFamily::V4, 1), vec!["2.2.2.2"]);
        assert_eq!(store.groups().dirty_slots(IpFamily::V4), vec![1]);
    }

    #[test]
    fn same_slot_groups_keep_every_address_tracked() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        store.load_group(IpFamily::V4, 0, "g0a".into(), &["1.1.1.1".into()]);
        store.load_group(IpFamily::V4, 0, "g0b".into(), &["2.2.2.2".into()]);

        assert_eq!(members(&store, IpFamily::V4, 0), vec!["1.1.1.1", "2.2.2.2"]);
        assert_eq!(
            store.groups().group(IpFamily::V4, 0).unwrap().remote_id(),
            Some("g0a")
        );

        // Unblocking an address from the first group still changes a group.
        assert!(store.apply(&remove("1.1.1.1")));
        assert_eq!(members(&store, IpFamily::V4, 0), vec!["2.2.2.2"]);
        assert_eq!(store.groups().dirty_slots(IpFamily::V4), vec![0]);
    }

    #[test]
    fn re_add_moves_address_out_of_oversized_group() {
        let mut store = BlockStore::new(2, GroupSelection::LeastLoaded);
        store.load_group(
            IpFamily::V4,
            0,
            "g0".into(),
            &["1.0.0.1".into(), "1.0.0.2".into(), "1.0.0.3".into()],
        );
        assert!(!store.groups().is_dirty(IpFamily::V4));

        assert!(store.apply(&add("1.0.0.3")));
        assert_eq!(store.addresses().slot_of(&addr("1.0.0.3")), Some(1));
        assert_eq!(members(&store, IpFamily::V4, 0).len(), 2);
        assert_eq!(store.groups().dirty_slots(IpFamily::V4), vec![0, 1]);

        // Back within capacity: re-adding is a no-op again.
        assert!(!store.apply(&add("1.0.0.1")));
    }

    #[test]
    fn removing_unknown_address_is_noop() {
        let mut store = BlockStore::new(10, GroupSelection::LeastLoaded);
        let before = store.clone();
        assert!(!store.apply(&remove("8.8.8.8")));
        assert_eq!(store, before);
    }
}
