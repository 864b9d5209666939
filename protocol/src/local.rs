use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{ModelStatus, PeerModelAdvert};

/// One entry of the node-local model manifest written by the model manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub source_repo_id: Option<String>,
    #[serde(default)]
    pub source_file_name: Option<String>,
    pub status: ModelStatus,
    #[serde(default)]
    pub seeder_count: u64,
    #[serde(default)]
    pub peer_count: u64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl LocalModel {
    pub fn to_advert(&self) -> PeerModelAdvert {
        let display_name = if self.name.is_empty() { self.id.clone() } else { self.name.clone() };
        PeerModelAdvert {
            model_id: self.id.clone(),
            display_name,
            content_hash: self.content_hash.clone(),
            source_repo_id: self.source_repo_id.clone(),
            source_file_name: self.source_file_name.clone(),
            status: self.status,
            seeder_count: self.seeder_count,
            peer_count: self.peer_count,
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Read the manifest. The file is owned by the model manager; never written here.
pub async fn load_manifest(path: &Path) -> Result<Vec<LocalModel>> {
    let data = tokio::fs::read_to_string(path).await
        .with_context(|| format!("Failed to read model manifest {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Malformed model manifest {}", path.display()))
}
