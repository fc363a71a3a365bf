//! StatusWatch - relays a remote console status endpoint to chat subscribers
//!
//! This library provides the subscriber registry, the status poller, the
//! notification dispatcher and the command handler, plus the Telegram
//! transport and the application wiring used by the binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod fetcher;
pub mod poller;
pub mod store;
pub mod task_manager;
pub mod telegram;

// Re-export core types for convenience
pub use crate::core::*;
