use anyhow::{Context, Result};
use std::time::Duration;

use crate::types::*;

/// Outbound client for the per-token endpoint every serving peer exposes
#[derive(Clone, Default)]
pub struct NextTokenClient {
    http: reqwest::Client,
}

impl NextTokenClient {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    /// Ask one peer for one token. An empty string means end of generation.
    pub async fn next_token(
        &self,
        base_url: &str,
        req: &NextTokenRequest,
        timeout: Duration,
    ) -> Result<String> {
        let url = format!("{}/api/next_token", base_url.trim_end_matches('/'));
        let resp = self.http.post(&url)
            .timeout(timeout)
            .json(req)
            .send()
            .await
            .with_context(|| format!("Failed to reach peer at {base_url}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Peer returned HTTP {status}");
        }
        let body: NextTokenResponse = resp.json().await
            .context("Failed to parse next-token response")?;
        Ok(body.token.unwrap_or_default())
    }
}

/// Client side of the registry's HTTP API, used by peer agents
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let url = format!("{}/api/peers/register", self.base_url);
        let resp = self.http.post(&url).json(req).send().await
            .context("Failed to connect to registry")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Registration failed: HTTP {status}");
        }
        resp.json().await.context("Failed to parse registration response")
    }

    pub async fn claim(&self, code: &str, peer_id: &str) -> Result<ClaimResponse> {
        let url = format!("{}/api/serve/claim", self.base_url);
        let body = ClaimRequest { code: code.to_string(), peer_id: peer_id.to_string() };
        let resp = self.http.post(&url).json(&body).send().await
            .context("Failed to send serve claim")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Claim failed: HTTP {status}");
        }
        resp.json().await.context("Failed to parse claim response")
    }

    pub async fn release(&self, code: &str, peer_id: &str) -> Result<bool> {
        let url = format!("{}/api/serve/release", self.base_url);
        let body = ReleaseRequest { code: code.to_string(), peer_id: peer_id.to_string() };
        let resp = self.http.post(&url).json(&body).send().await
            .context("Failed to send serve release")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Release failed: HTTP {status}");
        }
        let data: ReleaseResponse = resp.json().await?;
        Ok(data.released)
    }

    pub async fn models(&self) -> Result<Vec<AggregatedListing>> {
        let url = format!("{}/api/models", self.base_url);
        let resp = self.http.get(&url).send().await
            .context("Failed to fetch model listings")?;
        if !resp.status().is_success() {
            anyhow::bail!("Listing failed: HTTP {}", resp.status());
        }
        resp.json().await.context("Failed to parse model listings")
    }
}
