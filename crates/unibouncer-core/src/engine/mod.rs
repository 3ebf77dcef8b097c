// ── Synchronization engine ──
//
// Owns the block store, the wiring cache, and the firewall controller.
// `process` folds decision batches into the store without touching the
// network (apart from one-time zone preparation); `reconcile` pushes every
// dirty group of a family and wires it into the firewall.

mod bootstrap;
mod processor;
mod reconciler;
mod wiring;

pub use processor::ProcessReport;
pub use reconciler::ReconcileReport;
pub use wiring::WiringCache;

use crate::config::EngineConfig;
use crate::firewall::FirewallController;
use crate::model::{IpFamily, PerFamily};
use crate::store::BlockStore;

/// Address-list synchronization engine for one controller site.
pub struct Engine<F> {
    controller: F,
    config: EngineConfig,
    zone_based: bool,
    store: BlockStore,
    wiring: WiringCache,
    /// Zone preparation done for the family (always set in rules mode
    /// once the family is first touched).
    prepared: PerFamily<bool>,
}

impl<F: FirewallController> Engine<F> {
    /// An engine with empty caches. Prefer [`Engine::bootstrap`], which
    /// seeds the caches from the controller.
    pub fn new(controller: F, config: EngineConfig, zone_based: bool) -> Self {
        let store = BlockStore::new(config.max_group_size, config.group_selection);
        Self {
            controller,
            config,
            zone_based,
            store,
            wiring: WiringCache::new(),
            prepared: PerFamily::default(),
        }
    }

    pub fn controller(&self) -> &F {
        &self.controller
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn wiring(&self) -> &WiringCache {
        &self.wiring
    }

    /// Whether the site uses the zone-based firewall model.
    pub fn zone_based(&self) -> bool {
        self.zone_based
    }

    pub fn is_prepared(&self, family: IpFamily) -> bool {
        self.prepared[family]
    }

    /// Families the engine manages: IPv4 always, IPv6 when enabled.
    pub fn families(&self) -> impl Iterator<Item = IpFamily> + use<F> {
        let ipv6 = self.config.ipv6_enabled;
        IpFamily::all().filter(move |f| *f == IpFamily::V4 || ipv6)
    }

    /// Any managed family has groups waiting for a push.
    pub fn has_pending(&self) -> bool {
        self.families().any(|f| self.store.groups().is_dirty(f))
    }
}
