//! HTTP client for the generate route

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use url::Url;

use crate::config::AppConfig;
use crate::errors::LegalxError;
use crate::errors::Result;
use crate::session::FrameSource;
use crate::stream::FrameStream;

/// Longest error body kept from a non-success response
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

/// Client for `POST /generate`
#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: Client,
    url: Url,
}

impl GenerateClient {
    /// Create a client from configuration
    ///
    /// # Errors
    /// - invalid endpoint URL
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let url = config.generate_url()?;
        // No overall timeout: the body is read for as long as the backend streams
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs()))
            .build()?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send a prompt and return the streamed frames of the answer.
    ///
    /// Any non-2xx status is an error; the body of such a response is kept
    /// (truncated) for the log.
    pub async fn generate(&self, prompt: &str) -> Result<FrameStream> {
        info!("Sending prompt to {} ({} chars)", self.url, prompt.chars().count());

        let response = self
            .client
            .post(self.url.clone())
            .json(&GenerateRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(LegalxError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Backend answered {}, streaming body", status);
        Ok(FrameStream::from_bytes(response.bytes_stream()))
    }
}

#[async_trait]
impl FrameSource for GenerateClient {
    async fn open(&self, prompt: &str) -> Result<FrameStream> {
        self.generate(prompt).await
    }
}
