use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL advertised for the registry's own fallback entry
    pub public_url: String,
    /// Peers not re-registered within this window are evicted
    pub liveness_window: Duration,
    pub lease_ttl: Duration,
    /// Per-peer timeout for one next-token round
    pub round_timeout: Duration,
    /// Cap on total elapsed time for one generate call
    pub generate_deadline: Duration,
    /// Local model manifest consulted while no peer is live
    pub manifest: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7500,
            public_url: "http://127.0.0.1:7500".into(),
            liveness_window: Duration::from_secs(60),
            lease_ttl: Duration::from_secs(60),
            round_timeout: Duration::from_secs(8),
            generate_deadline: Duration::from_secs(120),
            manifest: None,
        }
    }
}
