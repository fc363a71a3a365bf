//! Fans a status update out to every subscriber.

use crate::core::{MessageSender, SubscriberId};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Formats the notification text for a canonical status.
pub fn format_status_message(status: &str) -> String {
    format!("Status changed:\n{}", status)
}

/// Sends status notifications through a [`MessageSender`].
#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    /// Sends `status` to each recipient in turn.
    ///
    /// A failed send is logged and the loop moves on to the next recipient;
    /// nothing is retried and no aggregate result is reported.
    #[instrument(skip_all)]
    pub async fn notify(&self, status: &str, recipients: impl IntoIterator<Item = SubscriberId>) {
        let text = format_status_message(status);
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for recipient in recipients {
            attempted += 1;
            match self.sender.send_message(recipient, &text).await {
                Ok(()) => {
                    metrics::counter!("notifications_sent_total").increment(1);
                    debug!(subscriber = %recipient, "Delivered status notification");
                }
                Err(e) => {
                    failed += 1;
                    metrics::counter!("notifications_failed_total").increment(1);
                    warn!(subscriber = %recipient, error = %e, "Failed to deliver status notification");
                }
            }
        }

        info!(attempted, failed, "Status notification round finished");
    }
}
