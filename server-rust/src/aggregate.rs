use std::collections::{HashMap, HashSet};

use swarm_protocol::{code_for, AggregatedListing, ListingExample, LocalModel, PeerRecord};

/// Peer id used for the registry's own entry when nobody else is registered
pub const SELF_PEER_ID: &str = "self";

/// Group every (peer, advert) pair by model code.
///
/// Output is sorted by node count, then total seeders, both descending. The
/// display name and content hash come from the first advert seen for a code,
/// in the order `records` is given.
pub fn aggregate(records: &[PeerRecord]) -> Vec<AggregatedListing> {
    let mut listings: Vec<AggregatedListing> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut contributors: Vec<HashSet<&str>> = Vec::new();

    for peer in records {
        for advert in &peer.models {
            let code = code_for(advert).into_string();
            let slot = *index.entry(code.clone()).or_insert_with(|| {
                listings.push(AggregatedListing {
                    code,
                    name: advert.display_name.clone(),
                    content_hash: None,
                    node_count: 0,
                    total_seeders: 0,
                    total_peers: 0,
                    examples: Vec::new(),
                });
                contributors.push(HashSet::new());
                listings.len() - 1
            });

            let listing = &mut listings[slot];
            if contributors[slot].insert(peer.peer_id.as_str()) {
                listing.node_count += 1;
            }
            if listing.content_hash.is_none() {
                listing.content_hash = advert.content_hash.clone();
            }
            listing.total_seeders += advert.seeder_count;
            listing.total_peers += advert.peer_count;
            listing.examples.push(ListingExample {
                peer_id: peer.peer_id.clone(),
                public_url: peer.public_url.clone(),
                status: advert.status,
                seeder_count: advert.seeder_count,
                peer_local_model_id: advert.model_id.clone(),
                capabilities: advert.capabilities.clone(),
            });
        }
    }

    // Stable, so equal keys keep first-seen order
    listings.sort_by(|a, b| {
        b.node_count
            .cmp(&a.node_count)
            .then(b.total_seeders.cmp(&a.total_seeders))
    });
    listings
}

/// Stand-in record for this node's own models, used only while no peer is live.
pub fn self_record(public_url: &str, local: &[LocalModel]) -> PeerRecord {
    PeerRecord {
        peer_id: SELF_PEER_ID.to_string(),
        public_url: public_url.trim_end_matches('/').to_string(),
        protocol_version: Some(swarm_protocol::PROTOCOL_VERSION.to_string()),
        last_seen_at: chrono::Utc::now(),
        models: local.iter().map(LocalModel::to_advert).collect(),
    }
}
