use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique peer identifier, chosen by the peer itself
pub type PeerId = String;

/// Capability a peer must advertise to take part in round-robin generation
pub const CAP_NEXT_TOKEN: &str = "next_token";

/// Upper bound for `maxTokens` on a generate request
pub const MAX_GENERATE_TOKENS: u32 = 2048;

/// Version string peers send with their registration
pub const PROTOCOL_VERSION: &str = "1";

/// Lifecycle of a model on one peer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Downloading,
    Ready,
    Serving,
    Error,
    Paused,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelStatus::Downloading => "downloading",
            ModelStatus::Ready => "ready",
            ModelStatus::Serving => "serving",
            ModelStatus::Error => "error",
            ModelStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// One model as reported by one peer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerModelAdvert {
    /// Peer-local identifier, unique within that peer
    pub model_id: String,
    #[serde(alias = "name", default)]
    pub display_name: String,
    /// Content-addressed hash of the weights (strongest identity signal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_name: Option<String>,
    pub status: ModelStatus,
    #[serde(default)]
    pub seeder_count: u64,
    #[serde(default)]
    pub peer_count: u64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl PeerModelAdvert {
    /// Whether this advert may receive next-token rounds.
    ///
    /// Older peers report no capabilities at all and are assumed compatible.
    pub fn supports_next_token(&self) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == CAP_NEXT_TOKEN)
    }
}

/// Peer → registry: "here is everything I hold right now"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub peer_id: PeerId,
    /// Base URL where this peer's HTTP API is reachable
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    pub models: Vec<PeerModelAdvert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub status: String,
    pub peer_id: PeerId,
    pub model_count: usize,
}

/// Last-known state of one registered node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub models: Vec<PeerModelAdvert>,
}

/// One peer's contribution to an aggregated listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingExample {
    pub peer_id: PeerId,
    pub public_url: String,
    pub status: ModelStatus,
    pub seeder_count: u64,
    pub peer_local_model_id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ListingExample {
    pub fn supports_next_token(&self) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == CAP_NEXT_TOKEN)
    }
}

/// Cross-peer view of one logical model, keyed by its model code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedListing {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub node_count: usize,
    pub total_seeders: u64,
    pub total_peers: u64,
    pub examples: Vec<ListingExample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub code: String,
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub granted: bool,
    /// Current lease holder when the claim is refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PeerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub code: String,
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Client → router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Model code; empty or unknown falls back to the top-ranked listing
    #[serde(default)]
    pub code: Option<String>,
    pub prompt: String,
    /// Signed so out-of-range values reach the clamp instead of failing to decode
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> i64 { 64 }
fn default_temperature() -> f32 { 0.7 }

impl GenerateRequest {
    pub fn clamped_max_tokens(&self) -> u32 {
        self.max_tokens.clamp(1, MAX_GENERATE_TOKENS as i64) as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub text: String,
    /// Number of rounds that produced a token
    pub tokens: u32,
    /// Code of the listing that served the request
    pub code: String,
}

/// Router → peer, one round of generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTokenRequest {
    pub model_id: String,
    pub prompt: String,
    pub temperature: f32,
}

/// A missing or empty token means the peer reached end of generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextTokenResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_payload_defaults() {
        let raw = r#"{
            "peerId": "p1",
            "publicUrl": "http://10.0.0.1:8080/",
            "models": [
                { "modelId": "llama", "name": "Llama 3", "status": "serving" }
            ]
        }"#;
        let req: RegisterRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.peer_id, "p1");
        assert!(req.protocol_version.is_none());
        let m = &req.models[0];
        assert_eq!(m.display_name, "Llama 3");
        assert_eq!(m.status, ModelStatus::Serving);
        assert_eq!(m.seeder_count, 0);
        assert!(m.capabilities.is_empty());
        assert!(m.supports_next_token());
    }

    #[test]
    fn test_register_rejects_non_list_models() {
        let raw = r#"{ "peerId": "p1", "publicUrl": "http://x", "models": {} }"#;
        assert!(serde_json::from_str::<RegisterRequest>(raw).is_err());
        let raw = r#"{ "publicUrl": "http://x", "models": [] }"#;
        assert!(serde_json::from_str::<RegisterRequest>(raw).is_err());
    }

    #[test]
    fn test_capability_filter() {
        let mut advert: PeerModelAdvert = serde_json::from_value(serde_json::json!({
            "modelId": "m", "status": "ready", "capabilities": ["chat"]
        }))
        .unwrap();
        assert!(!advert.supports_next_token());
        advert.capabilities.push(CAP_NEXT_TOKEN.into());
        assert!(advert.supports_next_token());
    }

    #[test]
    fn test_max_tokens_clamped() {
        let mut req = GenerateRequest {
            code: None,
            prompt: "hi".into(),
            max_tokens: 0,
            temperature: 0.7,
        };
        assert_eq!(req.clamped_max_tokens(), 1);
        req.max_tokens = 100_000;
        assert_eq!(req.clamped_max_tokens(), MAX_GENERATE_TOKENS);
        req.max_tokens = -5;
        assert_eq!(req.clamped_max_tokens(), 1);
        req.max_tokens = 12;
        assert_eq!(req.clamped_max_tokens(), 12);
    }

    #[test]
    fn test_out_of_range_max_tokens_decode() {
        let req: GenerateRequest =
            serde_json::from_str(r#"{ "prompt": "x", "maxTokens": 5000000000 }"#).unwrap();
        assert_eq!(req.clamped_max_tokens(), MAX_GENERATE_TOKENS);
        let req: GenerateRequest = serde_json::from_str(r#"{ "prompt": "x", "maxTokens": -5 }"#).unwrap();
        assert_eq!(req.clamped_max_tokens(), 1);
    }

    #[test]
    fn test_missing_token_is_end_of_stream() {
        let resp: NextTokenResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.token.is_none());
    }
}
