//! Configuration management for StatusWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, a `statuswatch.toml` file, environment variables
//! and command-line flags.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config file read from the working directory when `--config-file` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "statuswatch.toml";

/// The conventional environment variable carrying the bot token.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

pub const DEFAULT_STATUS_URL: &str = "https://4cloud.pro/api.php?method=get-consoles-status";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub core: CoreConfig,
    /// Settings for the remote status poller.
    #[serde(default)]
    pub status: StatusConfig,
    /// Settings for the subscriber record.
    #[serde(default)]
    pub store: StoreConfig,
    /// Settings for the Telegram transport.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// General application settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreConfig {
    /// The logging filter for the application.
    pub log_level: String,
}

/// Settings for the remote status poller.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    /// The endpoint polled each cycle.
    pub url: String,
    /// Seconds to sleep between cycles.
    pub interval_seconds: u64,
    /// Upper bound on a single status request.
    pub request_timeout_seconds: u64,
}

/// Settings for the subscriber record.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// Path of the JSON subscriber record.
    pub path: PathBuf,
}

/// Settings for the Telegram transport.
#[derive(Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    /// The bot token. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Seconds the server may hold a `getUpdates` request open.
    pub long_poll_timeout_seconds: u64,
    /// Upper bound on `getMe` and `sendMessage` requests.
    pub request_timeout_seconds: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("long_poll_timeout_seconds", &self.long_poll_timeout_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STATUS_URL.to_string(),
            interval_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chat_ids.json"),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.telegram.org".to_string(),
            long_poll_timeout_seconds: 60,
            request_timeout_seconds: 30,
        }
    }
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// environment variables and command-line flags, then validates it.
    ///
    /// Environment overrides use the `STATUSWATCH_` prefix with `__` between
    /// sections and keys, e.g. `STATUSWATCH_STATUS__INTERVAL_SECONDS=30`.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        figment = match &cli.config_file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at specified path: {}", path.display());
                }
                figment.merge(Toml::file(path))
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        let config: Config = figment
            .merge(Env::prefixed("STATUSWATCH_").split("__"))
            .merge(
                Env::raw()
                    .only(&[TOKEN_ENV_VAR])
                    .map(|_| "telegram.token".into()),
            )
            .merge(cli.clone())
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the application cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            bail!(
                "Telegram bot token is not set; provide it via the {} environment variable",
                TOKEN_ENV_VAR
            );
        }
        if self.status.interval_seconds == 0 {
            bail!("status.interval_seconds must be greater than zero");
        }
        if self.status.url.is_empty() {
            bail!("status.url must not be empty");
        }
        Ok(())
    }

    /// Returns the bot token. Only valid after [`Config::validate`] succeeded.
    pub fn token(&self) -> &str {
        self.telegram.token.as_deref().unwrap_or_default()
    }
}
