//! Handles `/start` and `/stop` commands arriving from the chat transport.

use crate::core::{InboundEvent, MessageSender, SubscriberId};
use crate::store::SubscriberStore;
use async_channel::Receiver;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const SUBSCRIBED_REPLY: &str = "You will now receive console status notifications.";
pub const UNSUBSCRIBED_REPLY: &str = "You will no longer receive console status notifications.";

/// A recognised chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Matches `text` against the known commands.
    ///
    /// Matching is literal: no trimming, no case folding, no `@botname` suffix.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "/start" => Some(Self::Start),
            "/stop" => Some(Self::Stop),
            _ => None,
        }
    }

    fn reply(self) -> &'static str {
        match self {
            Self::Start => SUBSCRIBED_REPLY,
            Self::Stop => UNSUBSCRIBED_REPLY,
        }
    }
}

/// Applies inbound commands to the subscriber store.
pub struct CommandHandler {
    store: SubscriberStore,
    sender: Arc<dyn MessageSender>,
}

impl CommandHandler {
    pub fn new(store: SubscriberStore, sender: Arc<dyn MessageSender>) -> Self {
        Self { store, sender }
    }

    /// Processes one event. Returns the command that was applied, if any.
    pub async fn handle(&self, event: &InboundEvent) -> Option<Command> {
        let text = event.text.as_deref()?;
        let Some(command) = Command::parse(text) else {
            debug!(subscriber = %event.sender, "Ignoring non-command message");
            return None;
        };

        self.apply(command, event.sender).await;
        if let Err(e) = self.sender.send_message(event.sender, command.reply()).await {
            warn!(subscriber = %event.sender, error = %e, "Failed to send command confirmation");
        }
        Some(command)
    }

    async fn apply(&self, command: Command, id: SubscriberId) {
        match command {
            Command::Start => {
                self.store.add(id);
                info!(subscriber = %id, "Subscriber added");
            }
            Command::Stop => {
                self.store.remove(id);
                info!(subscriber = %id, "Subscriber removed");
            }
        }

        // The record is written under the store lock; keep that off the runtime threads.
        let store = self.store.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || store.persist()).await {
            warn!(error = %e, "Subscriber persist task failed");
        }
    }

    /// Consumes `events` until the channel closes or shutdown is signalled.
    pub async fn run(self, events: Receiver<InboundEvent>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Command handler started.");
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Command handler received shutdown signal.");
                    break;
                }
                res = events.recv() => res,
            };

            match event {
                Ok(event) => {
                    self.handle(&event).await;
                }
                Err(_) => {
                    info!("Inbound event channel closed, command handler shutting down.");
                    break;
                }
            }
        }
        info!("Command handler finished.");
    }
}
