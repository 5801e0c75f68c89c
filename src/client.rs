//! The fetch client: JSON-over-HTTP with a single, uniform auth transport.
//!
//! Every remote interaction goes through [`ApiTransport`], a narrow seam that
//! unit tests replace with a queue-based mock. The production implementation
//! [`HttpClient`] wraps `reqwest` with the configured timeout and maps HTTP
//! outcomes onto the [`ApiError`] taxonomy. Calls are fire-once: no retry or
//! backoff lives at this layer — retrying is the user's action.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AuthTransport, Config};
use crate::envelope;
use crate::errors::ApiError;
use crate::session::Session;
use crate::telemetry::sanitize_for_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Trait abstraction over the HTTP transport, enabling test mocking.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Perform a JSON request. Returns the status and parsed body for 2xx
    /// responses; every other outcome is already classified as [`ApiError`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(u16, Value), ApiError>;

    /// Fetch a binary body (CSV export and similar blob endpoints).
    async fn fetch_blob(&self, path: &str) -> Result<Vec<u8>, ApiError>;

    /// Upload a file as `multipart/form-data` with a single file field.
    async fn upload_file(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(u16, Value), ApiError>;
}

/// Fetch a collection resource and decode its envelope.
pub async fn fetch_list<T: DeserializeOwned>(
    transport: &dyn ApiTransport,
    path: &str,
    payload_keys: &[&str],
) -> Result<Vec<T>, ApiError> {
    let (status, body) = transport.request(Method::Get, path, None).await?;
    envelope::decode_payload(status, body, payload_keys)
}

pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthTransport,
    session: Session,
}

impl HttpClient {
    pub fn new(config: &Config, session: Session) -> crate::errors::Result<Self> {
        config
            .validate()
            .map_err(|e| crate::errors::SyncError::Config(e.to_string()))?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)));
        if config.auth == AuthTransport::Cookie {
            builder = builder.cookie_store(true);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            auth: config.auth,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (self.auth, &self.session.token) {
            (AuthTransport::Bearer, Some(token)) => req.bearer_auth(token),
            // Cookie sessions ride on the client's cookie store.
            _ => req,
        }
    }

    async fn classify(response: reqwest::Response) -> Result<(u16, Value), ApiError> {
        let status = response.status();
        let code = status.as_u16();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthExpired);
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        if status.is_success() {
            if body.is_null() && !text.trim().is_empty() {
                return Err(ApiError::Parse(format!(
                    "response body was not JSON ({} bytes)",
                    text.len()
                )));
            }
            return Ok((code, body));
        }

        let message = envelope::server_message(&body)
            .unwrap_or_else(|| format!("Request failed with status {}", code));
        if status.is_client_error() {
            Err(ApiError::Validation {
                status: code,
                message,
            })
        } else {
            Err(ApiError::Server {
                status: code,
                message,
            })
        }
    }

    fn map_transport_error(e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ApiTransport for HttpClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(u16, Value), ApiError> {
        let url = self.url(path);
        debug!(%method, %url, "dispatching API request");

        let mut req = self.apply_auth(self.client.request(method.as_reqwest(), &url));
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await.map_err(Self::map_transport_error)?;
        let outcome = Self::classify(response).await;
        if let Err(e) = &outcome {
            // The message may quote the server's body; keep it one line.
            warn!(%method, %url, error = %sanitize_for_log(&e.to_string()), "API request failed");
        }
        outcome
    }

    async fn fetch_blob(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.url(path);
        debug!(%url, "fetching blob");

        let req = self.apply_auth(self.client.get(&url));
        let response = req.send().await.map_err(Self::map_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthExpired);
        }
        if !status.is_success() {
            let code = status.as_u16();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = envelope::server_message(&body)
                .unwrap_or_else(|| format!("Request failed with status {}", code));
            return if status.is_client_error() {
                Err(ApiError::Validation {
                    status: code,
                    message,
                })
            } else {
                Err(ApiError::Server {
                    status: code,
                    message,
                })
            };
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn upload_file(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(u16, Value), ApiError> {
        let url = self.url(path);
        debug!(%url, filename, "uploading file");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(field.to_string(), part);

        let req = self.apply_auth(self.client.post(&url)).multipart(form);
        let response = req.send().await.map_err(Self::map_transport_error)?;
        Self::classify(response).await
    }
}
