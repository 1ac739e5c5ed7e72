// Privileged-side HTTP fetch. The transport executor is the only component
// that touches the network; everything else goes through it.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{EngineError, Result};

/// The far-side fetch operations the transport executor runs. Production uses
/// [`HttpFetcher`]; tests substitute in-memory fakes.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetches a manifest body as text.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetches a segment body as raw bytes.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .redirect(redirect)
            .build()?;
        Ok(Self { client, config })
    }

    async fn get(
        &self,
        url: &str,
        timeout: std::time::Duration,
        operation: &'static str,
    ) -> Result<reqwest::Response> {
        let parsed = Url::parse(url).map_err(|e| EngineError::invalid_url(url, e.to_string()))?;
        trace!(%parsed, operation, "dispatching GET");
        let response = self.client.get(parsed).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(response.status(), url, operation));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .get(url, self.config.manifest_fetch_timeout, "manifest fetch")
            .await?;
        Ok(response.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self
            .get(url, self.config.segment_fetch_timeout, "segment fetch")
            .await?;
        Ok(response.bytes().await?)
    }
}
