// ── Address cache ──
//
// Which addresses are blocked, and which group slot holds each of them.

use std::collections::HashMap;

use crate::model::{BlockedAddress, GroupSlot, IpFamily, PerFamily};

/// Per-family map of blocked address -> assigned group slot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressCache {
    entries: PerFamily<HashMap<BlockedAddress, GroupSlot>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot currently holding `address`, if blocked.
    pub fn slot_of(&self, address: &BlockedAddress) -> Option<GroupSlot> {
        self.entries[address.family()].get(address).copied()
    }

    pub fn contains(&self, address: &BlockedAddress) -> bool {
        self.entries[address.family()].contains_key(address)
    }

    /// Record (or move) `address` into `slot`. Returns the previous slot.
    pub(crate) fn assign(&mut self, address: BlockedAddress, slot: GroupSlot) -> Option<GroupSlot> {
        self.entries[address.family()].insert(address, slot)
    }

    pub(crate) fn remove(&mut self, address: &BlockedAddress) -> Option<GroupSlot> {
        self.entries[address.family()].remove(address)
    }

    pub fn len(&self, family: IpFamily) -> usize {
        self.entries[family].len()
    }

    pub fn is_empty(&self, family: IpFamily) -> bool {
        self.entries[family].is_empty()
    }

    /// All blocked addresses of `family`, in no particular order.
    pub fn addresses(&self, family: IpFamily) -> impl Iterator<Item = &BlockedAddress> {
        self.entries[family].keys()
    }
}
