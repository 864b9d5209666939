use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use swarm_protocol::{ClaimResponse, PeerId};

/// Single-owner serve lease for one model code
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeLease {
    pub code: String,
    pub owner_peer_id: PeerId,
    pub granted_at: DateTime<Utc>,
}

/// Optimistic last-writer-wins lease table.
///
/// At most one unexpired lease exists per code. Two peers may still both start
/// serving before either sees its claim answer, so `serving` stays advisory.
pub struct LeaseTable {
    leases: RwLock<HashMap<String, ServeLease>>,
    ttl: Duration,
}

impl LeaseTable {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(60)),
        }
    }

    fn is_expired(&self, lease: &ServeLease, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(lease.granted_at) >= self.ttl
    }

    pub async fn claim(&self, code: &str, peer_id: &str) -> ClaimResponse {
        self.claim_at(code, peer_id, Utc::now()).await
    }

    /// Grant, renew or refuse. Expiry is checked here, lazily.
    pub async fn claim_at(&self, code: &str, peer_id: &str, now: DateTime<Utc>) -> ClaimResponse {
        let mut leases = self.leases.write().await;
        if let Some(current) = leases.get(code) {
            if current.owner_peer_id != peer_id && !self.is_expired(current, now) {
                tracing::debug!(code, peer_id, owner = %current.owner_peer_id, "Serve claim refused");
                return ClaimResponse { granted: false, owner: Some(current.owner_peer_id.clone()) };
            }
        }

        let previous = leases.insert(code.to_string(), ServeLease {
            code: code.to_string(),
            owner_peer_id: peer_id.to_string(),
            granted_at: now,
        });
        match previous {
            Some(p) if p.owner_peer_id == peer_id => {
                tracing::debug!(code, peer_id, "Serve lease renewed");
            }
            Some(p) => {
                tracing::info!(code, peer_id, previous = %p.owner_peer_id, "Expired serve lease taken over");
            }
            None => tracing::info!(code, peer_id, "Serve lease granted"),
        }
        ClaimResponse { granted: true, owner: None }
    }

    /// Drop the lease only if `peer_id` owns it. Returns whether anything was released.
    pub async fn release(&self, code: &str, peer_id: &str) -> bool {
        let mut leases = self.leases.write().await;
        match leases.get(code) {
            Some(lease) if lease.owner_peer_id == peer_id => {
                leases.remove(code);
                tracing::info!(code, peer_id, "Serve lease released");
                true
            }
            _ => false,
        }
    }

    /// Current unexpired lease on `code`, if any.
    pub async fn lease_at(&self, code: &str, now: DateTime<Utc>) -> Option<ServeLease> {
        let leases = self.leases.read().await;
        leases.get(code).filter(|l| !self.is_expired(l, now)).cloned()
    }

    pub async fn active_count_at(&self, now: DateTime<Utc>) -> usize {
        let leases = self.leases.read().await;
        leases.values().filter(|l| !self.is_expired(l, now)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LeaseTable {
        LeaseTable::new(std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_first_claim_granted_second_refused() {
        let t = table();
        let now = Utc::now();
        assert!(t.claim_at("abc1234", "x", now).await.granted);

        let denied = t.claim_at("abc1234", "y", now + Duration::seconds(5)).await;
        assert!(!denied.granted);
        assert_eq!(denied.owner.as_deref(), Some("x"));

        // Other codes are independent
        assert!(t.claim_at("fff0000", "y", now).await.granted);
    }

    #[tokio::test]
    async fn test_owner_renews() {
        let t = table();
        let t0 = Utc::now();
        t.claim_at("c", "x", t0).await;
        assert!(t.claim_at("c", "x", t0 + Duration::seconds(50)).await.granted);

        // 70s after the first grant but only 20s after the renewal
        let r = t.claim_at("c", "y", t0 + Duration::seconds(70)).await;
        assert!(!r.granted);
        assert!(t.claim_at("c", "y", t0 + Duration::seconds(110)).await.granted);
        let lease = t.lease_at("c", t0 + Duration::seconds(110)).await.unwrap();
        assert_eq!(lease.code, "c");
        assert_eq!(lease.owner_peer_id, "y");
        assert_eq!(lease.granted_at, t0 + Duration::seconds(110));
        assert!(t.lease_at("c", t0 + Duration::seconds(170)).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_claimable() {
        let t = table();
        let t0 = Utc::now();
        t.claim_at("c", "x", t0).await;
        assert!(!t.claim_at("c", "y", t0 + Duration::seconds(59)).await.granted);
        assert!(t.claim_at("c", "y", t0 + Duration::seconds(60)).await.granted);
    }

    #[tokio::test]
    async fn test_release_only_by_owner() {
        let t = table();
        let now = Utc::now();
        t.claim_at("c", "x", now).await;

        assert!(!t.release("c", "y").await);
        assert!(!t.claim_at("c", "y", now).await.granted);

        assert!(t.release("c", "x").await);
        assert!(t.claim_at("c", "y", now).await.granted);
        assert!(!t.release("missing", "x").await);
    }

    #[tokio::test]
    async fn test_single_holder_over_sequence() {
        let t = table();
        let t0 = Utc::now();
        let peers = ["a", "b", "c"];
        let mut holder: Option<(&str, i64)> = None;

        for step in 0..200i64 {
            let now = t0 + Duration::seconds(step * 7);
            let peer = peers[(step % 3) as usize];
            if step % 5 == 4 {
                if t.release("c0", peer).await {
                    assert_eq!(holder.map(|h| h.0), Some(peer));
                    holder = None;
                }
                continue;
            }
            let r = t.claim_at("c0", peer, now).await;
            let live_holder = holder.filter(|(_, at)| step * 7 - at < 60);
            match live_holder {
                Some((owner, _)) if owner != peer => {
                    assert!(!r.granted);
                    assert_eq!(r.owner.as_deref(), Some(owner));
                }
                _ => {
                    assert!(r.granted);
                    holder = Some((peer, step * 7));
                }
            }
            assert!(t.active_count_at(now).await <= 1);
        }
    }
}
