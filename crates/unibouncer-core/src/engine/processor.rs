// ── Decision processing ──

use tracing::{debug, error, trace};

use super::Engine;
use crate::error::CoreError;
use crate::firewall::FirewallController;
use crate::model::{Decision, IpFamily, PerFamily};

/// Outcome of folding one batch into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Decisions that changed group membership.
    pub changed: usize,
    /// Decisions that were already reflected in the store.
    pub unchanged: usize,
    /// Decisions for a family the engine does not manage.
    pub ignored: usize,
}

impl<F: FirewallController> Engine<F> {
    /// Apply a batch of decisions in order.
    ///
    /// The first batch that touches a family also prepares that family
    /// (zone resolution and policy ordering); a failure there is fatal.
    pub async fn process(&mut self, batch: &[Decision]) -> Result<ProcessReport, CoreError> {
        let mut touched = PerFamily::<bool>::default();
        let report = self.apply_batch(batch, &mut touched);

        for family in IpFamily::all() {
            if touched[family] && !self.prepared[family] {
                if let Err(e) = self.prepare_family(family).await {
                    error!(%family, error = %e, "failed to prepare firewall");
                    return Err(e);
                }
            }
        }

        debug!(
            decisions = batch.len(),
            changed = report.changed,
            unchanged = report.unchanged,
            ignored = report.ignored,
            "processed decision batch"
        );
        Ok(report)
    }

    fn apply_batch(&mut self, batch: &[Decision], touched: &mut PerFamily<bool>) -> ProcessReport {
        let mut report = ProcessReport::default();
        for decision in batch {
            let family = decision.family();
            if family == IpFamily::V6 && !self.config.ipv6_enabled {
                report.ignored += 1;
                continue;
            }
            touched[family] = true;
            if self.store.apply(decision) {
                trace!(address = %decision.address, action = ?decision.action, "applied decision");
                report.changed += 1;
            } else {
                report.unchanged += 1;
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{EngineConfig, FirewallMode};
    use crate::firewall::mock::{Call, MockFirewall};
    use crate::model::{BlockedAddress, ControllerSnapshot, RemoteZone};

    fn add(s: &str) -> Decision {
        Decision::add(s.parse::<BlockedAddress>().unwrap(), "crowdsec")
    }

    fn remove(s: &str) -> Decision {
        Decision::remove(s.parse::<BlockedAddress>().unwrap(), "crowdsec")
    }

    fn rules_engine(config: EngineConfig) -> Engine<MockFirewall> {
        Engine::new(MockFirewall::rules(), config, false)
    }

    #[tokio::test]
    async fn processing_does_not_call_controller_in_rules_mode() {
        let mut engine = rules_engine(EngineConfig::default());
        let report = engine
            .process(&[add("1.2.3.4"), add("5.6.7.8"), remove("1.2.3.4")])
            .await
            .unwrap();

        assert_eq!(report.changed, 3);
        assert!(engine.controller().calls().is_empty());
        assert!(engine.is_prepared(IpFamily::V4));
        assert!(!engine.is_prepared(IpFamily::V6));
    }

    #[tokio::test]
    async fn ipv6_decisions_ignored_when_disabled() {
        let mut engine = rules_engine(EngineConfig {
            ipv6_enabled: false,
            ..EngineConfig::default()
        });
        let report = engine
            .process(&[add("2001:db8::1"), add("1.2.3.4")])
            .await
            .unwrap();

        assert_eq!(report.ignored, 1);
        assert_eq!(report.changed, 1);
        assert!(engine.store().addresses().is_empty(IpFamily::V6));
        assert!(!engine.is_prepared(IpFamily::V6));
    }

    #[tokio::test]
    async fn repeated_add_reports_unchanged() {
        let mut engine = rules_engine(EngineConfig::default());
        engine.process(&[add("1.2.3.4")]).await.unwrap();
        let report = engine.process(&[add("1.2.3.4")]).await.unwrap();

        assert_eq!(report.changed, 0);
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn zone_preparation_failure_is_fatal() {
        // No zones on the controller: External cannot resolve.
        let config = EngineConfig {
            mode: FirewallMode::Zones,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(MockFirewall::zones(ControllerSnapshot::default()), config, true);

        let err = engine.process(&[add("1.2.3.4")]).await.unwrap_err();
        assert!(matches!(err, CoreError::Bootstrap { .. }));
        // The decision itself was still recorded.
        assert!(engine.store().addresses().contains(&"1.2.3.4".parse().unwrap()));
    }

    #[tokio::test]
    async fn zone_preparation_runs_once_per_family() {
        let snapshot = ControllerSnapshot {
            zones: ["External", "Internal", "Gateway"]
                .into_iter()
                .map(|n| RemoteZone {
                    id: format!("z-{n}"),
                    name: n.into(),
                })
                .collect(),
            ..ControllerSnapshot::default()
        };
        let mut engine = Engine::bootstrap(MockFirewall::zones(snapshot), EngineConfig::default())
            .await
            .unwrap();
        engine.controller().clear_calls();

        engine.process(&[add("1.2.3.4")]).await.unwrap();
        engine.process(&[add("5.6.7.8")]).await.unwrap();

        assert!(engine.is_prepared(IpFamily::V4));
        assert!(!engine.is_prepared(IpFamily::V6));
        // No bouncer policies exist yet, so preparation needs no writes.
        assert_eq!(engine.controller().calls(), Vec::<Call>::new());
    }
}
