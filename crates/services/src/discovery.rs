//! # Discovery service
//!
//! Finds peers the crawler has not seen and stages them for ingestion.
//! Three strategies feed one funnel: collect candidates, drop the
//! already staged, optionally drop the offline, then stage the rest in
//! a single write.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use domains::models::PeerId;
use domains::ports::{PeerGateway, PeerStore};

use crate::sample::sample_peers;

/// What one discovery pass did, for the cycle log line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub candidates: usize,
    pub already_staged: usize,
    pub offline: usize,
    pub staged: u64,
    pub failures: usize,
}

pub struct DiscoveryService {
    gateway: Arc<dyn PeerGateway>,
    store: Arc<dyn PeerStore>,
    seed_sample: usize,
}

impl DiscoveryService {
    pub fn new(gateway: Arc<dyn PeerGateway>, store: Arc<dyn PeerStore>, seed_sample: usize) -> Self {
        Self {
            gateway,
            store,
            seed_sample,
        }
    }

    /// Stages peers the node is directly connected to. A connected peer
    /// answered the node moments ago, so no liveness probe.
    pub async fn connected_pass(&self) -> DiscoveryStats {
        match self.gateway.connected_peers().await {
            Ok(peers) => self.stage_unseen(peers, false).await,
            Err(e) => {
                warn!(error = %e, "connected peer fetch failed");
                DiscoveryStats {
                    failures: 1,
                    ..DiscoveryStats::default()
                }
            }
        }
    }

    /// Stages the node's social graph, keeping only peers that answer a
    /// liveness probe.
    pub async fn follow_pass(&self) -> DiscoveryStats {
        match self.gateway.follow_peers().await {
            Ok(peers) => self.stage_unseen(peers, true).await,
            Err(e) => {
                warn!(error = %e, "follow peer fetch failed");
                DiscoveryStats {
                    failures: 1,
                    ..DiscoveryStats::default()
                }
            }
        }
    }

    /// Walks outward from a sample of staged peers and stages their
    /// routing-table and social neighborhoods.
    pub async fn graph_walk_pass(&self) -> DiscoveryStats {
        let staged = match self.store.staged_peers().await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "staged peer fetch failed");
                return DiscoveryStats {
                    failures: 1,
                    ..DiscoveryStats::default()
                };
            }
        };

        let seeds = sample_peers(&staged, self.seed_sample);
        let neighborhoods =
            join_all(seeds.iter().map(|seed| self.gateway.neighbors_of(seed))).await;

        let mut candidates = BTreeSet::new();
        let mut failures = 0;
        for (seed, neighborhood) in seeds.iter().zip(neighborhoods) {
            match neighborhood {
                Ok(peers) => candidates.extend(peers),
                Err(e) => {
                    debug!(seed = %seed, error = %e, "neighborhood fetch failed");
                    failures += 1;
                }
            }
        }

        let mut stats = self
            .stage_unseen(candidates.into_iter().collect(), false)
            .await;
        stats.failures += failures;
        stats
    }

    /// The shared funnel behind every pass.
    async fn stage_unseen(&self, candidates: Vec<PeerId>, check_liveness: bool) -> DiscoveryStats {
        let mut stats = DiscoveryStats {
            candidates: candidates.len(),
            ..DiscoveryStats::default()
        };
        if candidates.is_empty() {
            return stats;
        }

        let checks = join_all(candidates.iter().map(|peer| self.store.is_staged(peer))).await;
        let mut unseen = Vec::new();
        for (peer, check) in candidates.into_iter().zip(checks) {
            match check {
                Ok(true) => stats.already_staged += 1,
                Ok(false) => unseen.push(peer),
                Err(e) => {
                    debug!(peer = %peer, error = %e, "staging check failed");
                    stats.failures += 1;
                }
            }
        }

        let survivors = if check_liveness {
            let probes = join_all(unseen.iter().map(|peer| self.gateway.peer_online(peer))).await;
            let mut online = Vec::new();
            for (peer, up) in unseen.into_iter().zip(probes) {
                if up {
                    online.push(peer);
                } else {
                    stats.offline += 1;
                }
            }
            online
        } else {
            unseen
        };

        if survivors.is_empty() {
            return stats;
        }
        match self.store.stage_peers(&survivors).await {
            Ok(staged) => stats.staged = staged,
            Err(e) => {
                warn!(error = %e, "staging write failed");
                stats.failures += 1;
            }
        }
        stats
    }
}
