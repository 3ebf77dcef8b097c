// ── Group membership tracker ──
//
// Member sets of every bouncer-owned address group, the delta of each one
// against what was last pushed, and an explicit per-family dirty set.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::GroupSelection;
use crate::model::{BlockedAddress, GroupSlot, IpFamily, PerFamily};

/// In-memory state of one controller address group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallGroup {
    slot: GroupSlot,
    family: IpFamily,
    members: BTreeSet<BlockedAddress>,
    /// Members not yet pushed.
    added: BTreeSet<BlockedAddress>,
    /// Pushed members no longer wanted.
    removed: BTreeSet<BlockedAddress>,
    /// The last pushed set held entries that are not modelled (malformed or
    /// duplicated members found at load time).
    stale: bool,
    remote_id: Option<String>,
}

impl FirewallGroup {
    fn new(family: IpFamily, slot: GroupSlot) -> Self {
        Self {
            slot,
            family,
            members: BTreeSet::new(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            stale: false,
            remote_id: None,
        }
    }

    pub fn slot(&self) -> GroupSlot {
        self.slot
    }

    pub fn family(&self) -> IpFamily {
        self.family
    }

    pub fn members(&self) -> &BTreeSet<BlockedAddress> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Controller `_id`, once the group exists remotely.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Members differ from the last successful push.
    pub fn is_dirty(&self) -> bool {
        self.stale || !self.added.is_empty() || !self.removed.is_empty()
    }

    fn insert(&mut self, address: BlockedAddress) -> bool {
        if !self.members.insert(address) {
            return false;
        }
        if !self.removed.remove(&address) {
            self.added.insert(address);
        }
        true
    }

    fn remove(&mut self, address: &BlockedAddress) -> bool {
        if !self.members.remove(address) {
            return false;
        }
        if !self.added.remove(address) {
            self.removed.insert(*address);
        }
        true
    }

    /// Never pushed and nothing left to push.
    fn is_disposable(&self) -> bool {
        self.remote_id.is_none() && self.members.is_empty() && !self.is_dirty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct FamilyGroups {
    groups: BTreeMap<GroupSlot, FirewallGroup>,
    dirty: BTreeSet<GroupSlot>,
    /// Controller groups that share a slot with a tracked group. Their
    /// members were merged into it; each must be pushed empty once.
    retired: BTreeMap<String, GroupSlot>,
}

impl FamilyGroups {
    fn refresh(&mut self, slot: GroupSlot) {
        let Some(group) = self.groups.get(&slot) else {
            self.dirty.remove(&slot);
            return;
        };
        if group.is_disposable() {
            self.groups.remove(&slot);
            self.dirty.remove(&slot);
        } else if group.is_dirty() {
            self.dirty.insert(slot);
        } else {
            self.dirty.remove(&slot);
        }
    }
}

/// Per-family group membership with explicit dirty sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupTracker {
    families: PerFamily<FamilyGroups>,
}

impl GroupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, family: IpFamily, slot: GroupSlot) -> Option<&FirewallGroup> {
        self.families[family].groups.get(&slot)
    }

    /// All groups of `family`, by slot.
    pub fn groups(&self, family: IpFamily) -> impl Iterator<Item = &FirewallGroup> {
        self.families[family].groups.values()
    }

    pub fn group_count(&self, family: IpFamily) -> usize {
        self.families[family].groups.len()
    }

    /// Slots of `family` with unpushed changes, ascending.
    pub fn dirty_slots(&self, family: IpFamily) -> Vec<GroupSlot> {
        self.families[family].dirty.iter().copied().collect()
    }

    /// Anything of `family` waiting for a push, retired duplicates included.
    pub fn is_dirty(&self, family: IpFamily) -> bool {
        let fam = &self.families[family];
        !fam.dirty.is_empty() || !fam.retired.is_empty()
    }

    /// Duplicate controller groups still to be emptied, as `(id, slot)`.
    pub fn retired(&self, family: IpFamily) -> Vec<(String, GroupSlot)> {
        self.families[family]
            .retired
            .iter()
            .map(|(id, slot)| (id.clone(), *slot))
            .collect()
    }

    /// Pick the slot a newly blocked address should join.
    ///
    /// Only groups with fewer than `capacity` members qualify. When none
    /// does, the lowest unused slot is returned (a new group).
    pub fn select_slot(
        &self,
        family: IpFamily,
        capacity: usize,
        selection: GroupSelection,
    ) -> GroupSlot {
        let groups = &self.families[family].groups;
        let mut open = groups.values().filter(|g| g.len() < capacity);
        let chosen = match selection {
            GroupSelection::LeastLoaded => open.min_by_key(|g| (g.len(), g.slot)),
            GroupSelection::FirstFit => open.next(),
        };
        chosen.map_or_else(
            || (0..).find(|slot| !groups.contains_key(slot)).unwrap_or_default(),
            FirewallGroup::slot,
        )
    }

    pub(crate) fn add_member(&mut self, family: IpFamily, slot: GroupSlot, address: BlockedAddress) {
        let fam = &mut self.families[family];
        fam.groups
            .entry(slot)
            .or_insert_with(|| FirewallGroup::new(family, slot))
            .insert(address);
        fam.refresh(slot);
    }

    pub(crate) fn remove_member(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        address: &BlockedAddress,
    ) {
        let fam = &mut self.families[family];
        if let Some(group) = fam.groups.get_mut(&slot) {
            group.remove(address);
        }
        fam.refresh(slot);
    }

    /// Register a group read from the controller. Its members count as
    /// pushed; `stale` marks a remote member list the model cannot
    /// reproduce, forcing one push.
    ///
    /// A second group for an already tracked slot does not replace it: its
    /// members join the tracked group as unpushed additions and its id is
    /// retired.
    pub(crate) fn insert_loaded(
        &mut self,
        family: IpFamily,
        slot: GroupSlot,
        remote_id: String,
        members: impl IntoIterator<Item = BlockedAddress>,
        stale: bool,
    ) {
        let fam = &mut self.families[family];
        if let Some(kept) = fam.groups.get_mut(&slot) {
            for address in members {
                kept.insert(address);
            }
            kept.stale |= stale;
            fam.retired.insert(remote_id, slot);
        } else {
            let mut group = FirewallGroup::new(family, slot);
            group.members = members.into_iter().collect();
            group.remote_id = Some(remote_id);
            group.stale = stale;
            fam.groups.insert(slot, group);
        }
        fam.refresh(slot);
    }

    /// A retired group now holds nothing on the controller.
    pub(crate) fn mark_retired_emptied(&mut self, family: IpFamily, remote_id: &str) {
        self.families[family].retired.remove(remote_id);
    }

    /// Record the controller id of a freshly created group.
    pub(crate) fn set_remote_id(&mut self, family: IpFamily, slot: GroupSlot, id: String) {
        if let Some(group) = self.families[family].groups.get_mut(&slot) {
            group.remote_id = Some(id);
        }
    }

    /// The members as of the last push are now the current members.
    pub(crate) fn mark_pushed(&mut self, family: IpFamily, slot: GroupSlot) {
        let fam = &mut self.families[family];
        if let Some(group) = fam.groups.get_mut(&slot) {
            group.added.clear();
            group.removed.clear();
            group.stale = false;
        }
        fam.refresh(slot);
    }
}
