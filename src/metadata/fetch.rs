//! HTTP GET seam used by the resolver

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Raw HTTP response kept for error context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16, body: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. } | FetchError::Status { url, .. } => url,
        }
    }

    /// Response behind a status failure
    pub fn response(&self) -> Option<FetchResponse> {
        match self {
            FetchError::Status { status, body, .. } => Some(FetchResponse {
                status: *status,
                body: body.clone(),
            }),
            FetchError::Transport { .. } => None,
        }
    }
}

/// Plain GET returning status and body text; status is not interpreted here
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// `HttpFetcher` backed by reqwest
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        Ok(FetchResponse { status, body })
    }
}
