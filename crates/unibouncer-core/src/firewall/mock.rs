// In-memory controller used by engine and sync-loop tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::FirewallController;
use crate::error::CoreError;
use crate::model::{ControllerSnapshot, GroupSpec, PolicySpec, RuleSpec, ZonePairIds};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    DetectZoneBased,
    LoadSnapshot(bool),
    CreateGroup(GroupSpec),
    ReplaceGroup(String, GroupSpec),
    CreateRule(RuleSpec),
    CreatePolicy(PolicySpec),
    Reorder(ZonePairIds, Vec<String>),
}

#[derive(Debug, Default)]
pub(crate) struct MockFirewall {
    pub zone_based: bool,
    pub snapshot: ControllerSnapshot,
    /// Added to every group write.
    latency: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    failing_groups: Mutex<HashSet<String>>,
    fail_reorder: Mutex<bool>,
    next_id: AtomicUsize,
}

#[allow(clippy::unwrap_used)]
impl MockFirewall {
    pub fn rules() -> Self {
        Self::default()
    }

    pub fn zones(snapshot: ControllerSnapshot) -> Self {
        Self {
            zone_based: true,
            snapshot,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_snapshot(mut self, snapshot: ControllerSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Writes to the group named `name` fail until [`Self::heal_group`].
    pub fn fail_group(&self, name: &str) {
        self.failing_groups.lock().unwrap().insert(name.to_owned());
    }

    pub fn heal_group(&self, name: &str) {
        self.failing_groups.lock().unwrap().remove(name);
    }

    pub fn fail_reorder(&self, fail: bool) {
        *self.fail_reorder.lock().unwrap() = fail;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self, kind: &str) -> String {
        format!("{kind}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn check_group(&self, name: &str) -> Result<(), CoreError> {
        if self.failing_groups.lock().unwrap().contains(name) {
            return Err(CoreError::Api {
                message: format!("injected failure for {name}"),
                status: Some(500),
                transient: true,
            });
        }
        Ok(())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[allow(clippy::unwrap_used)]
impl FirewallController for MockFirewall {
    async fn detect_zone_based(&self) -> Result<bool, CoreError> {
        self.record(Call::DetectZoneBased);
        Ok(self.zone_based)
    }

    async fn load_snapshot(&self, zone_based: bool) -> Result<ControllerSnapshot, CoreError> {
        self.record(Call::LoadSnapshot(zone_based));
        Ok(self.snapshot.clone())
    }

    async fn create_group(&self, group: &GroupSpec) -> Result<String, CoreError> {
        self.delay().await;
        self.record(Call::CreateGroup(group.clone()));
        self.check_group(&group.name)?;
        Ok(self.next_id("group"))
    }

    async fn replace_group_members(&self, id: &str, group: &GroupSpec) -> Result<(), CoreError> {
        self.delay().await;
        self.record(Call::ReplaceGroup(id.to_owned(), group.clone()));
        self.check_group(&group.name)
    }

    async fn create_rule(&self, rule: &RuleSpec) -> Result<String, CoreError> {
        self.record(Call::CreateRule(rule.clone()));
        Ok(self.next_id("rule"))
    }

    async fn create_policy(&self, policy: &PolicySpec) -> Result<String, CoreError> {
        self.record(Call::CreatePolicy(policy.clone()));
        Ok(self.next_id("policy"))
    }

    async fn reorder_policies(
        &self,
        pair: &ZonePairIds,
        policy_ids: &[String],
    ) -> Result<(), CoreError> {
        self.record(Call::Reorder(pair.clone(), policy_ids.to_vec()));
        if *self.fail_reorder.lock().unwrap() {
            return Err(CoreError::Api {
                message: "injected reorder failure".into(),
                status: Some(500),
                transient: true,
            });
        }
        Ok(())
    }
}
