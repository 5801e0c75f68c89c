use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How the client proves the caller's identity to the API.
///
/// The corpus this crate replaces mixed bearer tokens and session cookies
/// page by page; here the transport is chosen exactly once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthTransport {
    #[default]
    Bearer,
    Cookie,
}

/// How a successful mutation is reconciled into the collection cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reconcile {
    /// Re-fetch the whole collection. The safe default: the server may apply
    /// side effects beyond the single returned entity.
    #[default]
    Reload,
    /// Patch the returned entity into the cache in place. Lower latency,
    /// only sound for endpoints with no further side effects.
    PatchLocal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the REST API, e.g. `https://dulas.example/api`.
    pub endpoint: String,

    #[serde(default)]
    pub auth: AuthTransport,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub reconcile: Reconcile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth: AuthTransport::default(),
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
            reconcile: Reconcile::default(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_request_timeout() -> u64 {
    20
}
fn default_poll_interval() -> u64 {
    30
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")
            }
            None => {
                let default_paths = ["remsync.toml", "~/.config/remsync/config.toml"];
                for p in &default_paths {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        return toml::from_str(&content).context("Failed to parse config");
                    }
                }
                Ok(Self::default())
            }
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the endpoint is a well-formed absolute URL.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint))?;
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be non-zero");
        }
        Ok(())
    }
}
