use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub registry_url: String,
    pub peer_id: String,
    /// Base URL the registry hands to routers for next-token calls
    pub public_url: String,
    pub port: u16,
    /// Model manifest written by the local model manager
    pub manifest: PathBuf,
    /// OpenAI-compatible inference server doing the actual sampling
    pub backend_url: String,
    pub register_interval_secs: u64,
}
