//! The periodic status poll loop.
//!
//! Each cycle fetches the remote status, drops it if it matches the upstream
//! error sentinel, and otherwise notifies every current subscriber. Cycles are
//! independent: a failed fetch only skips its own cycle and the loop keeps
//! its fixed cadence forever (or until shutdown is signalled).

use crate::core::{StatusSource, ERROR_SENTINEL};
use crate::dispatcher::Dispatcher;
use crate::store::SubscriberStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What a single poll cycle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetch failed; nothing was evaluated or sent.
    FetchFailed,
    /// The upstream reported its error sentinel; nothing was sent.
    Suppressed,
    /// A notification round ran against a snapshot of this many subscribers.
    Notified { recipients: usize },
}

/// Drives the status source on a fixed interval.
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    store: SubscriberStore,
    dispatcher: Dispatcher,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        store: SubscriberStore,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            interval,
        }
    }

    /// Runs one fetch / evaluate / notify cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        let status = match self.source.fetch_status().await {
            Ok(status) => status,
            Err(e) => {
                metrics::counter!("status_fetch_failures_total").increment(1);
                warn!(error = %e, "Failed to fetch status");
                return PollOutcome::FetchFailed;
            }
        };

        if status == ERROR_SENTINEL {
            metrics::counter!("status_suppressed_total").increment(1);
            debug!("Upstream reported an error; suppressing notification");
            return PollOutcome::Suppressed;
        }

        let recipients = self.store.snapshot();
        let count = recipients.len();
        debug!(recipients = count, "Dispatching status to subscribers");
        self.dispatcher.notify(&status, recipients).await;
        PollOutcome::Notified { recipients: count }
    }

    /// Polls until `shutdown_rx` changes or its sender is dropped.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs_f64(), "Status poller started.");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Status poller received shutdown signal.");
                    break;
                }
                outcome = self.poll_once() => {
                    debug!(?outcome, "Poll cycle finished");
                }
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Status poller received shutdown signal.");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Status poller finished.");
    }
}
