//! The main application logic, decoupled from the entry point.

use crate::{
    commands::CommandHandler,
    config::Config,
    core::{InboundEvent, MessageSender, StatusSource},
    dispatcher::Dispatcher,
    fetcher::StatusFetcher,
    poller::StatusPoller,
    store::SubscriberStore,
    task_manager::TaskManager,
    telegram::TelegramClient,
};
use anyhow::{bail, Context, Result};
use async_channel::Receiver;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    store: SubscriberStore,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The live subscriber registry.
    pub fn store(&self) -> &SubscriberStore {
        &self.store
    }

    /// Waits until the run is stopped and then for every task to finish.
    ///
    /// The run stops on the external shutdown signal or when the inbound
    /// event stream ends.
    pub async fn run(self) -> Result<()> {
        let mut stop_rx = self.task_manager.shutdown_rx();
        stop_rx.wait_for(|stop| *stop).await.ok();
        info!("Stop signal received. Waiting for tasks to complete...");

        let panicked = self.task_manager.shutdown().await;
        if !panicked.is_empty() {
            bail!("{} task(s) panicked: {}", panicked.len(), panicked.join(", "));
        }
        Ok(())
    }
}

/// Builder for the main application.
///
/// Every external collaborator can be overridden, which lets tests drive the
/// poller and the command handler without a network.
pub struct AppBuilder {
    config: Config,
    sender_override: Option<Arc<dyn MessageSender>>,
    status_source_override: Option<Arc<dyn StatusSource>>,
    events_rx_for_test: Option<Receiver<InboundEvent>>,
    store_override: Option<SubscriberStore>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sender_override: None,
            status_source_override: None,
            events_rx_for_test: None,
            store_override: None,
        }
    }

    /// Overrides the outbound message transport.
    pub fn sender_override(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender_override = Some(sender);
        self
    }

    /// Overrides the remote status source.
    pub fn status_source_override(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.status_source_override = Some(source);
        self
    }

    /// Feeds inbound events from `rx` instead of the Telegram listener.
    pub fn events_rx_for_test(mut self, rx: Receiver<InboundEvent>) -> Self {
        self.events_rx_for_test = Some(rx);
        self
    }

    /// Uses `store` instead of opening the configured record.
    pub fn store_override(mut self, store: SubscriberStore) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Builds all components and spawns the poller and the command handler.
    ///
    /// Fails if the Telegram session cannot be established; that is the only
    /// failure after configuration that stops the process.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        // Tasks watch an internal stop signal that the external shutdown
        // signal and the command handler can both raise.
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let task_manager = TaskManager::new(stop_rx);

        // =========================================================================
        // 1. Subscriber Store
        // =========================================================================
        let store = match self.store_override {
            Some(store) => store,
            None => {
                debug!(path = %config.store.path.display(), "Opening subscriber store");
                SubscriberStore::open(&config.store.path)
            }
        };
        info!(subscribers = store.len(), "Subscriber store ready");

        // =========================================================================
        // 2. Telegram Transport
        // =========================================================================
        let needs_telegram = self.sender_override.is_none() || self.events_rx_for_test.is_none();
        let telegram = if needs_telegram {
            let client = TelegramClient::new(config.token(), &config.telegram)?;
            let me = client
                .get_me()
                .await
                .context("Failed to establish Telegram session")?;
            info!(
                "Authorized on account {}",
                me.username.as_deref().unwrap_or(&me.first_name)
            );
            Some(client)
        } else {
            None
        };

        let sender: Arc<dyn MessageSender> = match (self.sender_override, &telegram) {
            (Some(sender), _) => sender,
            (None, Some(client)) => Arc::new(client.clone()),
            (None, None) => bail!("no message transport configured"),
        };

        let events_rx = match (self.events_rx_for_test, telegram) {
            (Some(rx), _) => rx,
            (None, Some(client)) => {
                let (tx, rx) = async_channel::unbounded();
                let shutdown_rx = task_manager.shutdown_rx();
                task_manager.spawn("TelegramUpdates", async move {
                    client.run_updates(tx, shutdown_rx).await;
                });
                rx
            }
            (None, None) => bail!("no inbound event source configured"),
        };

        // =========================================================================
        // 3. Status Poller
        // =========================================================================
        let source = match self.status_source_override {
            Some(source) => source,
            None => {
                debug!(url = %config.status.url, "Initializing status fetcher");
                Arc::new(StatusFetcher::new(
                    config.status.url.clone(),
                    config.status.request_timeout(),
                )?) as Arc<dyn StatusSource>
            }
        };
        let poller = StatusPoller::new(
            source,
            store.clone(),
            Dispatcher::new(sender.clone()),
            config.status.interval(),
        );
        task_manager.spawn("StatusPoller", poller.run(task_manager.shutdown_rx()));

        // =========================================================================
        // 4. Command Handler
        // =========================================================================
        let handler = CommandHandler::new(store.clone(), sender);
        let handler_rx = task_manager.shutdown_rx();
        let handler_stop = stop_tx.clone();
        task_manager.spawn("CommandHandler", async move {
            handler.run(events_rx, handler_rx).await;
            // Nobody can subscribe without inbound events.
            handler_stop.send_replace(true);
        });

        // =========================================================================
        // 5. Shutdown Relay
        // =========================================================================
        let mut relay_rx = task_manager.shutdown_rx();
        let mut shutdown_rx = shutdown_rx;
        task_manager.spawn("ShutdownRelay", async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    stop_tx.send_replace(true);
                }
                _ = relay_rx.changed() => {}
            }
        });

        info!("StatusWatch initialized successfully. Watching {}", config.status.url);

        Ok(App {
            task_manager,
            store,
        })
    }
}
