// ── Decision source ──
//
// Polls the CrowdSec LAPI decision stream and forwards each non-empty pull
// as one batch. The startup pull (the full active set) must succeed; later
// pull failures are logged and retried on the next tick.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use unibouncer_api::{LapiClient, LapiStreamResponse};

use crate::config::SourceConfig;
use crate::error::CoreError;
use crate::firewall::unifi::build_transport;
use crate::model::{Decision, DecisionAction};

/// Producer side of the decision channel.
pub struct DecisionSource {
    client: LapiClient,
    interval: Duration,
    origins: Vec<String>,
    scopes: Vec<String>,
}

impl DecisionSource {
    pub fn new(client: LapiClient, config: &SourceConfig) -> Self {
        Self {
            client,
            interval: config.update_interval,
            origins: config.origins.clone(),
            scopes: config.scopes.clone(),
        }
    }

    /// Build the LAPI client from config.
    pub fn from_config(config: &SourceConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config.tls, config.timeout);
        let client = LapiClient::new(config.url.clone(), &config.api_key, &transport)?;
        Ok(Self::new(client, config))
    }

    /// Pull until cancelled, sending batches on `tx`.
    ///
    /// Returns `Ok(())` on cancellation, including a pull cut short by it.
    /// Fails when the startup pull fails, when the LAPI rejects the key, or
    /// when the receiver is gone without a cancellation.
    pub async fn run(
        self,
        tx: mpsc::Sender<Vec<Decision>>,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        let startup = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            pulled = self.client.stream(true, &self.origins, &self.scopes) => pulled,
        };
        let startup = startup.map_err(|e| {
            error!(error = %e, "startup decision pull failed");
            CoreError::from(e)
        })?;
        info!(
            new = startup.new.as_ref().map_or(0, Vec::len),
            deleted = startup.deleted.as_ref().map_or(0, Vec::len),
            "startup decision pull complete"
        );
        forward(startup, &tx, &cancel).await?;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup pull covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("decision source cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let pulled = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!("decision pull abandoned on cancellation");
                            return Ok(());
                        }
                        pulled = self.client.stream(false, &self.origins, &self.scopes) => pulled,
                    };
                    match pulled {
                        Ok(pulled) => forward(pulled, &tx, &cancel).await?,
                        Err(e @ unibouncer_api::Error::Authentication { .. }) => {
                            error!(error = %e, "LAPI rejected the bouncer key");
                            return Err(e.into());
                        }
                        Err(e) => warn!(error = %e, "decision pull failed; retrying on next tick"),
                    }
                }
            }
        }
    }
}

/// Send one pull downstream unless it carried nothing usable. A receiver
/// that went away because of cancellation is a normal stop.
async fn forward(
    pulled: LapiStreamResponse,
    tx: &mpsc::Sender<Vec<Decision>>,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let batch = to_batch(pulled);
    if batch.is_empty() {
        return Ok(());
    }
    debug!(decisions = batch.len(), "forwarding decision batch");
    match tx.send(batch).await {
        Ok(()) => Ok(()),
        Err(_) if cancel.is_cancelled() => {
            debug!("batch dropped; synchronization loop already stopped");
            Ok(())
        }
        Err(_) => Err(CoreError::SourceTerminated {
            reason: "synchronization loop stopped receiving".into(),
        }),
    }
}

/// Convert a stream pull into engine decisions.
///
/// Deletions come first so that a decision replaced within the same pull
/// (deleted and re-added) ends up blocked.
pub fn to_batch(pulled: LapiStreamResponse) -> Vec<Decision> {
    let deleted = pulled
        .deleted
        .unwrap_or_default()
        .into_iter()
        .map(|d| (d, DecisionAction::Remove));
    let new = pulled
        .new
        .unwrap_or_default()
        .into_iter()
        .map(|d| (d, DecisionAction::Add));

    deleted
        .chain(new)
        .filter_map(|(raw, action)| match Decision::from_lapi(&raw, action) {
            Ok(decision) => Some(decision),
            Err(reason) => {
                warn!(value = %raw.value, %reason, "skipping decision");
                None
            }
        })
        .collect()
}
