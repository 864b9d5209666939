//! Model codes: the 7-character identity that lets differently-named adverts
//! for the same weights collapse into one listing.
//!
//! Precedence is fixed: content hash, then source repo + file name, then the
//! peer-local model id. The last tier can collide for unrelated models that
//! happen to share a local id; aggregation relies on this exact order.
//!
//! A content hash may be written as `<algo>:<hex>` (e.g. `sha256:ab12..`).
//! The prefix is dropped, and a hash that is not hex after that does not
//! count, so every code is lowercase hex.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::PeerModelAdvert;

pub const CODE_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCode(String);

impl ModelCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ModelCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Hex part of a content hash, without any `<algo>:` prefix.
fn hash_hex(hash: &str) -> Option<&str> {
    let hex = hash.rsplit_once(':').map_or(hash, |(_, rest)| rest).trim();
    (!hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())).then_some(hex)
}

fn short_digest(input: &str) -> String {
    let hex = format!("{:x}", Sha256::digest(input.as_bytes()));
    hex[..CODE_LEN].to_string()
}

/// Derive the canonical code for an advert. Pure and deterministic.
pub fn code_for(advert: &PeerModelAdvert) -> ModelCode {
    if let Some(hash) = present(&advert.content_hash).and_then(hash_hex) {
        let hash = hash.to_ascii_lowercase();
        return ModelCode(hash.chars().take(CODE_LEN).collect());
    }
    if let (Some(repo), Some(file)) = (
        present(&advert.source_repo_id),
        present(&advert.source_file_name),
    ) {
        return ModelCode(short_digest(&format!("{repo}::{file}")));
    }
    ModelCode(short_digest(&advert.model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelStatus;

    fn advert(model_id: &str) -> PeerModelAdvert {
        PeerModelAdvert {
            model_id: model_id.into(),
            display_name: model_id.into(),
            content_hash: None,
            source_repo_id: None,
            source_file_name: None,
            status: ModelStatus::Ready,
            seeder_count: 0,
            peer_count: 0,
            capabilities: vec![],
        }
    }

    #[test]
    fn test_content_hash_wins() {
        let mut a = advert("local-a");
        a.content_hash = Some("ABC123DEF4567".into());
        a.source_repo_id = Some("org/repo".into());
        a.source_file_name = Some("model.gguf".into());
        assert_eq!(code_for(&a).as_str(), "abc123d");
    }

    #[test]
    fn test_same_hash_different_names_collapse() {
        let mut a = advert("llama-q4");
        a.content_hash = Some("abc123def".into());
        a.display_name = "Llama".into();
        let mut b = advert("my-llama");
        b.content_hash = Some("abc123def".into());
        b.display_name = "Llama 3 8B".into();
        assert_eq!(code_for(&a), code_for(&b));
    }

    #[test]
    fn test_source_repo_tier() {
        let mut a = advert("one");
        a.source_repo_id = Some("TheBloke/Mistral-7B".into());
        a.source_file_name = Some("mistral.Q4_K_M.gguf".into());
        let mut b = advert("two");
        b.source_repo_id = a.source_repo_id.clone();
        b.source_file_name = a.source_file_name.clone();

        let code = code_for(&a);
        assert_eq!(code, code_for(&b));
        assert_eq!(code.as_str(), &short_digest("TheBloke/Mistral-7B::mistral.Q4_K_M.gguf"));
        assert_ne!(code, code_for(&advert("one")));
    }

    #[test]
    fn test_partial_source_falls_back_to_model_id() {
        let mut a = advert("solo");
        a.source_repo_id = Some("org/repo".into());
        assert_eq!(code_for(&a), code_for(&advert("solo")));

        let mut blank = advert("solo");
        blank.content_hash = Some("   ".into());
        assert_eq!(code_for(&blank), code_for(&advert("solo")));
    }

    #[test]
    fn test_code_shape_and_determinism() {
        let a = advert("tinyllama");
        let first = code_for(&a);
        for _ in 0..10 {
            assert_eq!(code_for(&a), first);
        }
        assert_eq!(first.as_str().len(), CODE_LEN);
        assert!(first
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Fixed across process instances
        assert_eq!(first.as_str(), &format!("{:x}", Sha256::digest(b"tinyllama"))[..7]);
    }

    #[test]
    fn test_short_hash_used_whole() {
        let mut a = advert("x");
        a.content_hash = Some("BEEF".into());
        assert_eq!(code_for(&a).as_str(), "beef");
    }

    #[test]
    fn test_algorithm_prefix_stripped() {
        let mut a = advert("x");
        a.content_hash = Some("sha256:AB12CD34EF".into());
        assert_eq!(code_for(&a).as_str(), "ab12cd3");

        let mut b = advert("y");
        b.content_hash = Some("ab12cd34ef".into());
        assert_eq!(code_for(&a), code_for(&b));
    }

    #[test]
    fn test_non_hex_hash_falls_through() {
        let mut a = advert("solo");
        a.content_hash = Some("not-a-hash".into());
        assert_eq!(code_for(&a), code_for(&advert("solo")));

        a.source_repo_id = Some("org/repo".into());
        a.source_file_name = Some("model.gguf".into());
        assert_eq!(code_for(&a).as_str(), &short_digest("org/repo::model.gguf"));

        let mut bare = advert("solo");
        bare.content_hash = Some("sha256:".into());
        assert_eq!(code_for(&bare), code_for(&advert("solo")));
    }
}
