//! End-to-end subscribe / notify / unsubscribe flows through the app wiring.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::mock_sender::MockSender;
use helpers::scripted_source::ScriptedSource;
use helpers::wait_until;
use statuswatch::app::App;
use statuswatch::commands::{CommandHandler, SUBSCRIBED_REPLY, UNSUBSCRIBED_REPLY};
use statuswatch::config::Config;
use statuswatch::core::{InboundEvent, SubscriberId, ERROR_SENTINEL};
use statuswatch::dispatcher::Dispatcher;
use statuswatch::poller::{PollOutcome, StatusPoller};
use statuswatch::store::SubscriberStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

fn test_config(interval_seconds: u64) -> Config {
    let mut config = Config::default();
    config.telegram.token = Some("test-token".to_string());
    config.status.interval_seconds = interval_seconds;
    config
}

#[tokio::test]
async fn test_start_poll_stop_poll_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chat_ids.json");
    let store = SubscriberStore::open(&path);
    let sender = MockSender::new();
    let source = ScriptedSource::new();

    let handler = CommandHandler::new(store.clone(), Arc::new(sender.clone()));
    let poller = StatusPoller::new(
        Arc::new(source.clone()),
        store.clone(),
        Dispatcher::new(Arc::new(sender.clone())),
        Duration::from_secs(10),
    );

    handler.handle(&InboundEvent::text(111, "/start")).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"111":true}"#);
    assert_eq!(sender.sent_to(111), vec![SUBSCRIBED_REPLY.to_string()]);

    source.set(r#"{"consoles":[{"id":1,"status":"online"}]}"#);
    assert_eq!(poller.poll_once().await, PollOutcome::Notified { recipients: 1 });
    assert_eq!(
        sender.notifications(),
        vec![(
            SubscriberId(111),
            "Status changed:\n{\"consoles\":[{\"id\":1,\"status\":\"online\"}]}".to_string()
        )]
    );

    handler.handle(&InboundEvent::text(111, "/stop")).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    assert_eq!(sender.sent_to(111).last().unwrap(), UNSUBSCRIBED_REPLY);

    sender.clear();
    source.set(ERROR_SENTINEL);
    assert_eq!(poller.poll_once().await, PollOutcome::Suppressed);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_subscriptions_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chat_ids.json");

    {
        let store = SubscriberStore::open(&path);
        let handler = CommandHandler::new(store, Arc::new(MockSender::new()));
        handler.handle(&InboundEvent::text(1, "/start")).await;
        handler.handle(&InboundEvent::text(2, "/start")).await;
        handler.handle(&InboundEvent::text(1, "/stop")).await;
    }

    let reopened = SubscriberStore::open(&path);
    assert!(!reopened.contains(SubscriberId(1)));
    assert!(reopened.contains(SubscriberId(2)));
}

#[tokio::test]
async fn test_app_relays_status_to_subscribers() {
    let dir = tempdir().unwrap();
    let store = SubscriberStore::with_path(dir.path().join("chat_ids.json"));
    let sender = MockSender::new();
    let source = ScriptedSource::new();
    source.set(r#"{"consoles":[]}"#);
    let (events_tx, events_rx) = async_channel::unbounded();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(test_config(1))
        .sender_override(Arc::new(sender.clone()))
        .status_source_override(Arc::new(source.clone()))
        .events_rx_for_test(events_rx)
        .store_override(store.clone())
        .build(shutdown_rx)
        .await
        .unwrap();
    let app_handle = tokio::spawn(app.run());

    events_tx.send(InboundEvent::text(42, "/start")).await.unwrap();
    assert!(wait_until(WAIT, || store.contains(SubscriberId(42))).await);

    // The first cycle may have run before the subscription; the next one must
    // reach the new subscriber.
    let notified = wait_until(WAIT, || !sender.notifications().is_empty()).await;
    assert!(notified, "subscriber never received a status");
    assert_eq!(
        sender.notifications()[0],
        (SubscriberId(42), "Status changed:\n{\"consoles\":[]}".to_string())
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(WAIT, app_handle)
        .await
        .expect("app did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_app_ignores_non_commands_and_non_text() {
    let store = SubscriberStore::in_memory();
    let sender = MockSender::new();
    let source = ScriptedSource::new();
    source.set(ERROR_SENTINEL);
    let (events_tx, events_rx) = async_channel::unbounded();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(test_config(1))
        .sender_override(Arc::new(sender.clone()))
        .status_source_override(Arc::new(source.clone()))
        .events_rx_for_test(events_rx)
        .store_override(store.clone())
        .build(shutdown_rx)
        .await
        .unwrap();
    let app_handle = tokio::spawn(app.run());

    events_tx.send(InboundEvent::non_text(5)).await.unwrap();
    events_tx.send(InboundEvent::text(5, "hello")).await.unwrap();
    events_tx.send(InboundEvent::text(5, "/START")).await.unwrap();
    events_tx.send(InboundEvent::text(6, "/start")).await.unwrap();

    // Events are handled in order, so once 6 is stored the others were seen.
    assert!(wait_until(WAIT, || store.contains(SubscriberId(6))).await);
    assert!(!store.contains(SubscriberId(5)));
    assert!(sender.sent_to(5).is_empty());

    // The sentinel keeps the poller quiet.
    assert!(wait_until(WAIT, || source.fetches() >= 2).await);
    assert!(sender.notifications().is_empty());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(WAIT, app_handle)
        .await
        .expect("app did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_fetch_failure_skips_cycle_and_loop_recovers() {
    let store = SubscriberStore::in_memory();
    store.add(SubscriberId(9));
    let sender = MockSender::new();
    let source = ScriptedSource::new();
    source.fail();

    let poller = StatusPoller::new(
        Arc::new(source.clone()),
        store,
        Dispatcher::new(Arc::new(sender.clone())),
        Duration::from_millis(20),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(poller.run(shutdown_rx));

    assert!(wait_until(WAIT, || source.fetches() >= 3).await);
    assert!(sender.sent().is_empty());

    source.set(r#"{"ok":1}"#);
    assert!(wait_until(WAIT, || !sender.notifications().is_empty()).await);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}
