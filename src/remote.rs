//! Remote threshold configuration.
//!
//! Fetches posture thresholds from a server exposing
//! `GET {base}/api/posture_thresholds`, which answers with an object keyed by
//! the external threshold names:
//!
//! ```json
//! { "neck_angle_threshold": 35, "torso_angle_threshold": 10, "alignment_threshold": 30 }
//! ```
//!
//! Missing keys keep their current value. Any failure leaves the caller's
//! thresholds untouched.

use crate::core::Thresholds;
use std::collections::HashMap;

/// Path of the thresholds endpoint relative to the base URL.
pub const THRESHOLDS_PATH: &str = "/api/posture_thresholds";

/// Remote configuration error types.
#[derive(Debug)]
pub enum RemoteConfigError {
    /// Client setup error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body was not a thresholds object
    Parse(String),
}

impl std::fmt::Display for RemoteConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteConfigError::Config(msg) => write!(f, "Remote config setup error: {msg}"),
            RemoteConfigError::Network(msg) => write!(f, "Remote config network error: {msg}"),
            RemoteConfigError::Server { status, message } => {
                write!(f, "Remote config server error ({status}): {message}")
            }
            RemoteConfigError::Parse(msg) => write!(f, "Remote config parse error: {msg}"),
        }
    }
}

impl std::error::Error for RemoteConfigError {}

/// Full URL of the thresholds endpoint for a base URL.
pub fn thresholds_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), THRESHOLDS_PATH)
}

/// Extract numeric threshold values from a response body.
///
/// Values may be numbers or numeric strings. Anything else is skipped.
pub fn parse_thresholds_body(body: &serde_json::Value) -> Result<HashMap<String, f64>, RemoteConfigError> {
    let object = body
        .as_object()
        .ok_or_else(|| RemoteConfigError::Parse("expected a JSON object".to_string()))?;

    let values = object
        .iter()
        .filter_map(|(key, value)| {
            let number = match value {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number.map(|n| (key.clone(), n))
        })
        .collect();

    Ok(values)
}

/// Apply fetched values on top of `current`, logging rejected keys.
pub fn merge_remote(current: &Thresholds, values: &HashMap<String, f64>) -> Thresholds {
    let (merged, rejected) = current.merge_named(values);
    for key in &rejected {
        tracing::warn!(key = %key, "Ignoring non-positive remote threshold");
    }
    merged
}

/// Client for the remote thresholds endpoint.
#[cfg(feature = "remote-config")]
pub struct ThresholdClient {
    base_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "remote-config")]
impl ThresholdClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteConfigError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| RemoteConfigError::Config(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn url(&self) -> String {
        thresholds_url(&self.base_url)
    }

    /// Fetch the raw named values.
    pub async fn fetch_named(&self) -> Result<HashMap<String, f64>, RemoteConfigError> {
        let response = self
            .client
            .get(self.url())
            .send()
            .await
            .map_err(|e| RemoteConfigError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteConfigError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteConfigError::Parse(e.to_string()))?;

        parse_thresholds_body(&body)
    }

    /// Fetch thresholds merged on top of `current`.
    pub async fn fetch(&self, current: &Thresholds) -> Result<Thresholds, RemoteConfigError> {
        let values = self.fetch_named().await?;
        Ok(merge_remote(current, &values))
    }

    /// Fetch thresholds, keeping `current` on any failure.
    pub async fn fetch_or_keep(&self, current: &Thresholds) -> Thresholds {
        match self.fetch(current).await {
            Ok(thresholds) => {
                tracing::info!(url = %self.url(), "Loaded remote thresholds");
                thresholds
            }
            Err(e) => {
                tracing::warn!("Remote thresholds unavailable, keeping previous values: {e}");
                *current
            }
        }
    }
}

/// Blocking threshold client for use in synchronous contexts.
#[cfg(feature = "remote-config")]
pub struct BlockingThresholdClient {
    inner: ThresholdClient,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "remote-config")]
impl BlockingThresholdClient {
    /// Create a new blocking client.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteConfigError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RemoteConfigError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: ThresholdClient::new(base_url)?,
            runtime,
        })
    }

    pub fn url(&self) -> String {
        self.inner.url()
    }

    pub fn fetch(&self, current: &Thresholds) -> Result<Thresholds, RemoteConfigError> {
        self.runtime.block_on(self.inner.fetch(current))
    }

    pub fn fetch_or_keep(&self, current: &Thresholds) -> Thresholds {
        self.runtime.block_on(self.inner.fetch_or_keep(current))
    }
}
