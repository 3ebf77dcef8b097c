// ── Synchronization loop ──
//
// Drains decision batches into the engine and flushes dirty groups once the
// stream has been quiet for the inactivity period. The flush timer is armed
// by a batch, by a flush that left groups dirty, or at start when the
// bootstrap loaded groups that need a push. Otherwise an idle bouncer makes
// no controller calls.

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::engine::Engine;
use crate::error::CoreError;
use crate::firewall::FirewallController;
use crate::model::Decision;
use crate::source::DecisionSource;

/// What the loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
    /// Waiting for a batch or for the flush timer.
    Idle,
    /// Applying a batch to the engine.
    Draining,
    /// Pushing dirty groups to the controller.
    Flushing,
    /// The loop has exited.
    Terminated,
}

/// Consumer side of the decision channel.
pub struct SyncLoop<F> {
    engine: Engine<F>,
    decisions: mpsc::Receiver<Vec<Decision>>,
    cancel: CancellationToken,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
}

impl<F: FirewallController> SyncLoop<F> {
    pub fn new(
        engine: Engine<F>,
        decisions: mpsc::Receiver<Vec<Decision>>,
        cancel: CancellationToken,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            engine,
            decisions,
            cancel,
            config,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Run until cancelled or until the decision channel closes.
    ///
    /// A flush in progress when cancellation arrives is abandoned; groups it
    /// did not reach stay dirty in the returned engine. A closed channel is
    /// an error: the bouncer cannot enforce anything without decisions.
    pub async fn run(mut self) -> Result<Engine<F>, CoreError> {
        let cancel = self.cancel.clone();
        let timer = tokio::time::sleep(self.config.initial_delay);
        tokio::pin!(timer);
        // Groups loaded stale or duplicated at bootstrap are pushed even if
        // no decision ever arrives.
        let mut armed = self.engine.has_pending();
        let mut first_batch = true;

        let result = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("synchronization loop cancelled");
                    break Ok(());
                }

                batch = self.decisions.recv() => {
                    let Some(batch) = batch else {
                        error!("decision channel closed");
                        break Err(CoreError::SourceTerminated {
                            reason: "decision channel closed".into(),
                        });
                    };

                    self.set_state(SyncState::Draining);
                    if let Err(e) = self.engine.process(&batch).await {
                        break Err(e);
                    }

                    // The first batch is the startup pull: give the stream
                    // longer to settle before the first flush.
                    let delay = if first_batch {
                        self.config.initial_delay
                    } else {
                        self.config.inactivity
                    };
                    first_batch = false;
                    timer.as_mut().reset(Instant::now() + delay);
                    armed = true;
                    self.set_state(SyncState::Idle);
                }

                () = &mut timer, if armed => {
                    armed = false;
                    self.set_state(SyncState::Flushing);

                    let pending = tokio::select! {
                        biased;
                        () = cancel.cancelled() => None,
                        pending = self.flush() => Some(pending),
                    };
                    let Some(pending) = pending else {
                        info!("flush interrupted by cancellation");
                        break Ok(());
                    };

                    if pending {
                        debug!(retry = ?self.config.retry, "groups still dirty; scheduling retry");
                        timer.as_mut().reset(Instant::now() + self.config.retry);
                        armed = true;
                    }
                    self.set_state(SyncState::Idle);
                }
            }
        };

        self.set_state(SyncState::Terminated);
        result.map(|()| self.engine)
    }

    /// Reconcile every managed family. Returns whether anything is left dirty.
    async fn flush(&mut self) -> bool {
        let families: Vec<_> = self.engine.families().collect();
        for family in families {
            let report = self.engine.reconcile(family).await;
            if !report.is_clean() {
                warn!(
                    %family,
                    failed = report.failed.len(),
                    "some groups were not pushed"
                );
            }
        }
        self.engine.has_pending()
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
    }
}

/// Run the decision source and the synchronization loop until `cancel`
/// fires or either side fails. The first failure cancels the other side.
///
/// On a clean stop the engine is handed back, with whatever it did not
/// manage to push still marked dirty.
pub async fn run_bouncer<F: FirewallController>(
    engine: Engine<F>,
    source: DecisionSource,
    config: SyncConfig,
    cancel: CancellationToken,
) -> Result<Engine<F>, CoreError> {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

    let source_cancel = cancel.clone();
    let source_task = tokio::spawn(async move {
        let result = source.run(tx, source_cancel.clone()).await;
        if result.is_err() {
            source_cancel.cancel();
        }
        result
    });

    let sync_result = SyncLoop::new(engine, rx, cancel.clone(), config).run().await;
    cancel.cancel();

    let source_result = source_task.await.map_err(|e| CoreError::SourceTerminated {
        reason: format!("decision source task failed: {e}"),
    })?;

    // Either side failing tears down the other, which then reports a
    // terminated stream; surface the original cause.
    match (sync_result, source_result) {
        (Err(e), _) if !matches!(e, CoreError::SourceTerminated { .. }) => Err(e),
        (_, Err(e)) | (Err(e), Ok(())) => Err(e),
        (Ok(engine), Ok(())) => Ok(engine),
    }
}
