//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `statuswatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays a remote console status endpoint to Telegram subscribers.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "statuswatch=trace").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// URL of the status endpoint to poll.
    #[arg(long, value_name = "URL")]
    pub status_url: Option<String>,

    /// Seconds to wait between status polls.
    #[arg(long, value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,

    /// Path of the subscriber record.
    #[arg(long, value_name = "FILE")]
    pub store_path: Option<PathBuf>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            insert_nested(&mut dict, "core", "log_level", Value::from(level.clone()));
        }

        if let Some(url) = &self.status_url {
            insert_nested(&mut dict, "status", "url", Value::from(url.clone()));
        }

        if let Some(seconds) = self.interval_seconds {
            insert_nested(&mut dict, "status", "interval_seconds", Value::from(seconds));
        }

        if let Some(path) = &self.store_path {
            insert_nested(
                &mut dict,
                "store",
                "path",
                Value::from(path.to_string_lossy().into_owned()),
            );
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Sets `section.key = value`, creating the section table if needed.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
    if let Value::Dict(_, inner) = entry {
        inner.insert(key.to_string(), value);
    }
}
