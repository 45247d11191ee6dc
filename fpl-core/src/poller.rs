use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::detector::{ChangeDetector, ChangeEvent, CycleOutcome};
use crate::error::FplError;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

pub struct PollerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub async fn stop(self) -> Result<(), FplError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(FplError::from)
    }
}

/// Runs a detection cycle on every tick and forwards non-empty event batches.
pub fn spawn_detector(
    detector: Arc<ChangeDetector>,
    config: PollConfig,
    events_tx: mpsc::Sender<Vec<ChangeEvent>>,
) -> PollerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("detector poller shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = detector.run_cycle().await;
                    if let Some(events) = report(outcome) {
                        if events_tx.send(events).await.is_err() {
                            warn!("change event receiver dropped");
                        }
                    }
                }
            }
        }
    });

    PollerHandle { cancel_tx, join }
}

fn report(outcome: CycleOutcome) -> Option<Vec<ChangeEvent>> {
    match outcome {
        CycleOutcome { skipped: true, .. } => {
            info!("detection cycle skipped");
            None
        }
        CycleOutcome {
            error: Some(err), ..
        } => {
            warn!(error = %err, "detection cycle failed");
            None
        }
        CycleOutcome {
            is_initial_run: true,
            ..
        } => None,
        CycleOutcome { events, .. } if !events.is_empty() => Some(events),
        _ => None,
    }
}
