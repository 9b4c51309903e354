//! API client for the Magpie model endpoints

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unable to connect to Magpie server at {url}, is the server active?")]
    Unreachable { url: String },

    #[error("Magpie server at {url} did not respond within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(#[source] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Prefix `http://` to a bare `host:port` address
pub fn normalize_url(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        debug!("Appending 'http://' to '{}'", raw);
        format!("http://{}", raw)
    }
}

/// One entry of a `model_info` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub description: String,
}

/// Default request timeout, above the server's default per-model bound
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;

        let mut base_url = Url::parse(&normalize_url(base_url))?;
        // keep any path prefix when joining relative endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn model_info(&self, path: &str) -> Result<Vec<ModelInfo>> {
        self.get(path, &[]).await
    }

    /// Query a prediction endpoint. Rejected requests still yield their
    /// `errors` body so it can be shown to the user.
    pub async fn prediction(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        self.get(path, params).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> Result<T> {
        let url = self.base_url.join(path)?;
        debug!(url = %url, params = params.len(), "Sending request");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(ClientError::Decode);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                match serde_json::from_str::<Value>(&body) {
                    Ok(value) if value.get("errors").is_some() => {
                        serde_json::from_value(value).map_err(|_| ClientError::Status { status, body })
                    }
                    _ => Err(ClientError::Status { status, body }),
                }
            }
            _ => Err(ClientError::Status { status, body }),
        }
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_connect() {
            ClientError::Unreachable {
                url: self.base_url.to_string(),
            }
        } else if err.is_timeout() {
            ClientError::Timeout {
                url: self.base_url.to_string(),
                timeout: self.timeout,
            }
        } else {
            ClientError::Request(err)
        }
    }
}
