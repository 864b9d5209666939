use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use swarm_protocol::{PeerId, PeerRecord, RegisterRequest};

struct Entry {
    /// Position in first-registration order
    seq: u64,
    record: PeerRecord,
}

struct Inner {
    peers: HashMap<PeerId, Entry>,
    next_seq: u64,
}

/// Last-known state of every registered peer.
///
/// Eviction is lazy: records older than the liveness window are dropped on
/// the next read or write, never by a timer.
pub struct PeerStore {
    inner: RwLock<Inner>,
    liveness: Duration,
}

impl PeerStore {
    pub fn new(liveness: std::time::Duration) -> Self {
        Self {
            inner: RwLock::new(Inner { peers: HashMap::new(), next_seq: 0 }),
            liveness: Duration::from_std(liveness).unwrap_or_else(|_| Duration::seconds(60)),
        }
    }

    fn is_live(&self, record: &PeerRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.last_seen_at) <= self.liveness
    }

    fn evict(&self, inner: &mut Inner, now: DateTime<Utc>) {
        inner.peers.retain(|id, entry| {
            let alive = self.is_live(&entry.record, now);
            if !alive {
                tracing::info!(peer_id = %id, "Peer missed liveness window, evicting");
            }
            alive
        });
    }

    pub async fn register(&self, req: RegisterRequest) -> PeerRecord {
        self.register_at(req, Utc::now()).await
    }

    /// Insert or fully replace the record for `req.peer_id`.
    pub async fn register_at(&self, req: RegisterRequest, now: DateTime<Utc>) -> PeerRecord {
        let record = PeerRecord {
            public_url: req.public_url.trim_end_matches('/').to_string(),
            peer_id: req.peer_id,
            protocol_version: req.protocol_version,
            last_seen_at: now,
            models: req.models,
        };

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        self.evict(inner, now);
        match inner.peers.get_mut(&record.peer_id) {
            Some(entry) => {
                tracing::debug!(peer_id = %record.peer_id, models = record.models.len(), "Peer refreshed");
                entry.record = record.clone();
            }
            None => {
                tracing::info!(
                    peer_id = %record.peer_id,
                    url = %record.public_url,
                    models = record.models.len(),
                    "New peer registered"
                );
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.peers.insert(record.peer_id.clone(), Entry { seq, record: record.clone() });
            }
        }
        record
    }

    pub async fn list_live(&self) -> Vec<PeerRecord> {
        self.list_live_at(Utc::now()).await
    }

    /// Snapshot of live records in first-registration order; evicts stale ones.
    pub async fn list_live_at(&self, now: DateTime<Utc>) -> Vec<PeerRecord> {
        let mut inner = self.inner.write().await;
        self.evict(&mut inner, now);
        let mut entries: Vec<&Entry> = inner.peers.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_protocol::{ModelStatus, PeerModelAdvert};

    fn advert(id: &str) -> PeerModelAdvert {
        PeerModelAdvert {
            model_id: id.into(),
            display_name: id.into(),
            content_hash: None,
            source_repo_id: None,
            source_file_name: None,
            status: ModelStatus::Ready,
            seeder_count: 1,
            peer_count: 1,
            capabilities: vec![],
        }
    }

    fn req(peer: &str, models: Vec<PeerModelAdvert>) -> RegisterRequest {
        RegisterRequest {
            peer_id: peer.into(),
            public_url: format!("http://{peer}.local:8080/"),
            protocol_version: Some("1".into()),
            models,
        }
    }

    fn store() -> PeerStore {
        PeerStore::new(std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_register_then_list_once() {
        let store = store();
        let now = Utc::now();
        store.register_at(req("p1", vec![advert("a")]), now).await;
        store.register_at(req("p1", vec![advert("a")]), now).await;
        store.register_at(req("p1", vec![advert("a")]), now).await;

        let live = store.list_live_at(now).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].peer_id, "p1");
        assert_eq!(live[0].public_url, "http://p1.local:8080");
    }

    #[tokio::test]
    async fn test_models_replaced_wholesale() {
        let store = store();
        let now = Utc::now();
        store.register_at(req("p1", vec![advert("a"), advert("b")]), now).await;
        store.register_at(req("p1", vec![advert("c")]), now).await;

        let live = store.list_live_at(now).await;
        let ids: Vec<_> = live[0].models.iter().map(|m| m.model_id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn test_stale_peer_evicted() {
        let store = store();
        let t0 = Utc::now();
        store.register_at(req("old", vec![]), t0).await;
        store.register_at(req("fresh", vec![]), t0 + Duration::seconds(50)).await;

        let live = store.list_live_at(t0 + Duration::seconds(60)).await;
        assert_eq!(live.len(), 2);

        let live = store.list_live_at(t0 + Duration::seconds(61)).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].peer_id, "fresh");
        assert!(store.inner.read().await.peers.get("old").is_none());
    }

    #[tokio::test]
    async fn test_refresh_extends_liveness() {
        let store = store();
        let t0 = Utc::now();
        store.register_at(req("p1", vec![]), t0).await;
        store.register_at(req("p1", vec![]), t0 + Duration::seconds(40)).await;
        let live = store.list_live_at(t0 + Duration::seconds(90)).await;
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let store = store();
        let now = Utc::now();
        for id in ["c", "a", "b"] {
            store.register_at(req(id, vec![]), now).await;
        }
        // Refresh does not move a peer
        store.register_at(req("c", vec![]), now).await;
        let order: Vec<_> = store.list_live_at(now).await.into_iter().map(|r| r.peer_id).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
