//! Polling client for the query server

use crate::query_server::Reply;
use crate::trap::TrapRecord;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct TrapClient {
    client: Client,
    base_url: String,
}

impl TrapClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// All buffered traps; the server keeps them
    pub async fn get_all(&self) -> Result<Vec<TrapRecord>> {
        self.fetch("/traps").await
    }

    /// All buffered traps; the server forgets them
    pub async fn flush(&self) -> Result<Vec<TrapRecord>> {
        self.fetch("/flush").await
    }

    async fn fetch(&self, route: &str) -> Result<Vec<TrapRecord>> {
        let url = format!("{}{}", self.base_url, route);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request to {} failed with status {}: {}", url, status, body);
        }

        let reply: Reply<Vec<TrapRecord>> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;
        debug!("Fetched {} traps from {}", reply.content.len(), url);
        Ok(reply.content)
    }
}
