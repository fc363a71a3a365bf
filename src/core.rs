//! Core domain types and service traits for StatusWatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical text the upstream returns when it cannot report console status.
///
/// A poll whose canonicalized body equals this string byte-for-byte never
/// produces a notification.
pub const ERROR_SENTINEL: &str = r#"[{"Status":"Error"}]"#;

/// Identifies one chat that may receive notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl SubscriberId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for SubscriberId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single event received from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// The chat the event originated from.
    pub sender: SubscriberId,
    /// Text content, if the event carried any.
    pub text: Option<String>,
}

impl InboundEvent {
    /// Creates an event carrying a text message.
    pub fn text(sender: i64, text: impl Into<String>) -> Self {
        Self {
            sender: SubscriberId(sender),
            text: Some(text.into()),
        }
    }

    /// Creates an event without textual content (stickers, photos, joins, ...).
    pub fn non_text(sender: i64) -> Self {
        Self {
            sender: SubscriberId(sender),
            text: None,
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers outbound text messages through the chat transport.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `text` to the chat identified by `recipient`.
    ///
    /// # Returns
    /// * `Ok(())` if the transport accepted the message
    /// * `Err` on network failures or when the transport rejects the message
    async fn send_message(&self, recipient: SubscriberId, text: &str) -> Result<()>;
}

/// Produces the canonical text of the current upstream status.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Performs one fetch of the remote status.
    ///
    /// # Returns
    /// * `Ok(String)` containing the canonical JSON text
    /// * `Err` for transport failures or bodies that are not valid JSON
    async fn fetch_status(&self) -> Result<String>;
}
