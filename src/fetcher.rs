//! HTTP client for the remote console status endpoint.
//!
//! The upstream payload has no fixed schema. Each fetch parses the body as
//! generic JSON and re-serializes it in a canonical form (compact, object
//! keys sorted) so that equal statuses always produce equal strings.

use crate::core::StatusSource;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Number, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur while fetching the remote status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("status body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Fetches the remote status over HTTP.
#[derive(Debug, Clone)]
pub struct StatusFetcher {
    client: Client,
    url: String,
}

impl StatusFetcher {
    /// Creates a fetcher with its own HTTP client.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, url))
    }

    /// Creates a fetcher that reuses an existing HTTP client.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issues one GET and returns the canonical text of the response body.
    ///
    /// The HTTP status code is not inspected; any body that parses as JSON
    /// is canonicalized.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<String, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, bytes = body.len(), "Received status response");
        canonicalize(&body)
    }
}

#[async_trait]
impl StatusSource for StatusFetcher {
    async fn fetch_status(&self) -> anyhow::Result<String> {
        Ok(self.fetch().await?)
    }
}

/// Parses `body` as JSON and returns its canonical serialization.
pub fn canonicalize(body: &[u8]) -> Result<String, FetchError> {
    let value: Value = serde_json::from_slice(body)?;
    Ok(serde_json::to_string(&sort_keys(value))?)
}

/// Rebuilds `value` with every object's keys in ascending order and every
/// integral number written as an integer.
///
/// `serde_json::Map` only iterates in key order while `preserve_order` is off.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        Value::Number(n) => Value::Number(normalize_number(n)),
        other => other,
    }
}

/// Maps `1.0`, `1e0` and `1` onto the same number.
fn normalize_number(n: Number) -> Number {
    // 2^63 and 2^64; both are exact as f64.
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

    let Some(f) = n.as_f64().filter(|_| n.is_f64()) else {
        return n;
    };
    if f.fract() != 0.0 || !f.is_finite() {
        return n;
    }
    if (0.0..U64_BOUND).contains(&f) {
        Number::from(f as u64)
    } else if (-I64_BOUND..0.0).contains(&f) {
        Number::from(f as i64)
    } else {
        n
    }
}
