use chrono::{DateTime, Utc};
use std::sync::Arc;

use swarm_protocol::{local, AggregatedListing};

use crate::aggregate;
use crate::config::Config;
use crate::lease::LeaseTable;
use crate::router::TokenRouter;
use crate::store::PeerStore;

/// Everything the registry owns. Built once in `main`, shared by handlers.
pub struct AppState {
    pub config: Config,
    pub peers: PeerStore,
    pub leases: LeaseTable,
    pub router: TokenRouter,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            peers: PeerStore::new(config.liveness_window),
            leases: LeaseTable::new(config.lease_ttl),
            router: TokenRouter::new(config.round_timeout, config.generate_deadline),
            config,
            start_time: Utc::now(),
        })
    }

    /// Aggregated view of live peers, or of the local manifest while none are live.
    pub async fn listings(&self) -> Vec<AggregatedListing> {
        let records = self.peers.list_live().await;
        if !records.is_empty() {
            return aggregate::aggregate(&records);
        }
        let Some(path) = &self.config.manifest else {
            return Vec::new();
        };
        match local::load_manifest(path).await {
            Ok(models) if !models.is_empty() => {
                aggregate::aggregate(&[aggregate::self_record(&self.config.public_url, &models)])
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("Local model manifest unavailable: {e:#}");
                Vec::new()
            }
        }
    }
}
