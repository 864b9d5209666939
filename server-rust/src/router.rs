use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use swarm_protocol::{AggregatedListing, ListingExample, ModelStatus, NextTokenClient, NextTokenRequest};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("no eligible peers for model {code:?}")]
    NoEligiblePeers { code: String },
}

/// Result of one stitched generation
#[derive(Debug, Clone)]
pub struct Generation {
    pub code: String,
    pub text: String,
    /// Rounds that produced a token
    pub tokens: u32,
}

/// Listing for `code`, or the top-ranked one when `code` is empty or unknown.
pub fn select_listing<'a>(listings: &'a [AggregatedListing], code: &str) -> Option<&'a AggregatedListing> {
    let code = code.trim();
    if !code.is_empty() {
        if let Some(l) = listings.iter().find(|l| l.code.eq_ignore_ascii_case(code)) {
            return Some(l);
        }
    }
    listings.first()
}

/// Examples that are serving and speak next_token, in listing order
pub fn eligible_peers(listing: &AggregatedListing) -> Vec<&ListingExample> {
    listing
        .examples
        .iter()
        .filter(|e| e.status == ModelStatus::Serving && e.supports_next_token())
        .collect()
}

/// Round-robins next-token calls across the serving peers of one listing.
#[derive(Clone)]
pub struct TokenRouter {
    client: NextTokenClient,
    round_timeout: Duration,
    deadline: Duration,
}

impl TokenRouter {
    pub fn new(round_timeout: Duration, deadline: Duration) -> Self {
        Self { client: NextTokenClient::new(), round_timeout, deadline }
    }

    /// Rounds run sequentially: each one extends the prompt with the text so far.
    /// A failed or timed-out round yields nothing and the rotation moves on.
    pub async fn generate(
        &self,
        listings: &[AggregatedListing],
        code: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, GenerateError> {
        let listing = select_listing(listings, code)
            .ok_or_else(|| GenerateError::NoEligiblePeers { code: code.to_string() })?;
        let peers = eligible_peers(listing);
        if peers.is_empty() {
            return Err(GenerateError::NoEligiblePeers { code: listing.code.clone() });
        }

        tracing::info!(
            code = %listing.code,
            peers = peers.len(),
            max_tokens,
            "Starting distributed generation"
        );

        let started = Instant::now();
        let mut text = String::new();
        let mut tokens = 0u32;

        for round in 0..max_tokens as usize {
            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                tracing::warn!(code = %listing.code, round, "Generation deadline reached");
                break;
            }
            let timeout = self.round_timeout.min(self.deadline - elapsed);

            let peer = peers[round % peers.len()];
            let req = NextTokenRequest {
                model_id: peer.peer_local_model_id.clone(),
                prompt: format!("{prompt}{text}"),
                temperature,
            };
            match self.client.next_token(&peer.public_url, &req, timeout).await {
                Ok(token) if token.is_empty() => {
                    tracing::debug!(peer_id = %peer.peer_id, round, "End of generation");
                    break;
                }
                Ok(token) => {
                    tracing::debug!(peer_id = %peer.peer_id, round, "Token received");
                    text.push_str(&token);
                    tokens += 1;
                }
                Err(e) => {
                    tracing::warn!(peer_id = %peer.peer_id, round, error = %e, "Round failed, skipping");
                }
            }
        }

        tracing::info!(
            code = %listing.code,
            tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(Generation { code: listing.code.clone(), text, tokens })
    }
}
