use anyhow::Result;
use std::collections::HashSet;

use swarm_protocol::{
    code_for, local, ModelStatus, PeerModelAdvert, RegisterRequest, RegistryClient, CAP_NEXT_TOKEN,
    PROTOCOL_VERSION,
};

use crate::server::NodeState;

/// Adverts for every manifest entry; this node always speaks next_token.
pub fn build_adverts(models: &[local::LocalModel]) -> Vec<PeerModelAdvert> {
    models
        .iter()
        .map(|m| {
            let mut advert = m.to_advert();
            if !advert.capabilities.iter().any(|c| c == CAP_NEXT_TOKEN) {
                advert.capabilities.push(CAP_NEXT_TOKEN.to_string());
            }
            advert
        })
        .collect()
}

/// One registration cycle: claim leases for serving models, downgrade the
/// ones another peer holds, release leases we no longer need, then register.
pub async fn announce(client: &RegistryClient, state: &NodeState) -> Result<usize> {
    let cfg = &state.config;
    let models = local::load_manifest(&cfg.manifest).await?;
    let mut adverts = build_adverts(&models);

    let mut wanted = HashSet::new();
    for advert in adverts.iter_mut().filter(|a| a.status == ModelStatus::Serving) {
        let code = code_for(advert).into_string();
        match client.claim(&code, &cfg.peer_id).await {
            Ok(resp) if resp.granted => {
                wanted.insert(code);
            }
            Ok(resp) => {
                tracing::info!(
                    code = %code,
                    owner = ?resp.owner,
                    model_id = %advert.model_id,
                    "Another peer serves this model, advertising as ready"
                );
                advert.status = ModelStatus::Ready;
            }
            Err(e) => {
                // Registry unreachable: registration below will fail too
                tracing::warn!(code = %code, "Serve claim failed: {e:#}");
                advert.status = ModelStatus::Ready;
            }
        }
    }

    let stale: Vec<String> = {
        let mut held = state.held.write().await;
        let stale: Vec<String> = held.difference(&wanted).cloned().collect();
        *held = wanted;
        stale
    };
    for code in stale {
        if let Err(e) = client.release(&code, &cfg.peer_id).await {
            tracing::debug!(code = %code, "Lease release failed: {e:#}");
        }
    }

    let req = RegisterRequest {
        peer_id: cfg.peer_id.clone(),
        public_url: cfg.public_url.clone(),
        protocol_version: Some(PROTOCOL_VERSION.to_string()),
        models: adverts,
    };
    let ack = client.register(&req).await?;
    Ok(ack.model_count)
}

/// Give back every lease on shutdown so other peers can take over at once.
pub async fn release_all(client: &RegistryClient, state: &NodeState) {
    let held: Vec<String> = state.held.write().await.drain().collect();
    for code in held {
        match client.release(&code, &state.config.peer_id).await {
            Ok(_) => tracing::info!(code = %code, "Released serve lease"),
            Err(e) => tracing::warn!(code = %code, "Failed to release lease: {e:#}"),
        }
    }
}
