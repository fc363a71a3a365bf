//! A message sender that records every attempt instead of talking to Telegram.

use anyhow::Result;
use async_trait::async_trait;
use statuswatch::core::{MessageSender, SubscriberId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct MockSender {
    sent: Arc<Mutex<Vec<(SubscriberId, String)>>>,
    failing: Arc<Mutex<HashSet<SubscriberId>>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `id` fail after being recorded.
    pub fn fail_for(self, id: i64) -> Self {
        self.failing.lock().unwrap().insert(SubscriberId(id));
        self
    }

    pub fn sent(&self) -> Vec<(SubscriberId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == SubscriberId(id))
            .map(|(_, text)| text)
            .collect()
    }

    /// Messages whose text is a status notification.
    pub fn notifications(&self) -> Vec<(SubscriberId, String)> {
        self.sent()
            .into_iter()
            .filter(|(_, text)| text.starts_with("Status changed:"))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_message(&self, recipient: SubscriberId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        if self.failing.lock().unwrap().contains(&recipient) {
            anyhow::bail!("Forbidden: bot was blocked by the user");
        }
        Ok(())
    }
}
