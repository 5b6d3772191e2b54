//! # Crawl scheduler
//!
//! Drives the pipeline forever, alternating a discovery phase with an
//! ingest phase and sleeping a uniform 10-100s before each. The jitter
//! keeps a fleet of crawlers from hitting the node in step.

use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::discovery::DiscoveryService;
use crate::ingest::IngestService;

pub struct Scheduler {
    discovery: DiscoveryService,
    ingest: IngestService,
    min_delay_secs: u64,
    max_delay_secs: u64,
}

impl Scheduler {
    pub fn new(
        discovery: DiscoveryService,
        ingest: IngestService,
        min_delay_secs: u64,
        max_delay_secs: u64,
    ) -> Self {
        Self {
            discovery,
            ingest,
            min_delay_secs,
            max_delay_secs,
        }
    }

    pub async fn run(self) {
        loop {
            self.pause().await;
            self.discovery_phase().await;
            self.pause().await;
            self.ingest_phase().await;
        }
    }

    /// One discovery phase: connected peers, then the social graph, then
    /// a graph walk seeded from staged peers.
    pub async fn discovery_phase(&self) {
        let connected = self.discovery.connected_pass().await;
        info!(
            candidates = connected.candidates,
            staged = connected.staged,
            failures = connected.failures,
            "connected peer pass"
        );

        let follows = self.discovery.follow_pass().await;
        info!(
            candidates = follows.candidates,
            staged = follows.staged,
            offline = follows.offline,
            failures = follows.failures,
            "follow peer pass"
        );

        let walked = self.discovery.graph_walk_pass().await;
        info!(
            candidates = walked.candidates,
            staged = walked.staged,
            failures = walked.failures,
            "graph walk pass"
        );
    }

    /// One ingest phase: never-seen peers first, then a refresh sample
    /// of the existing catalog.
    pub async fn ingest_phase(&self) {
        let fresh = self.ingest.fresh_pass().await;
        info!(
            candidates = fresh.candidates,
            ingested = fresh.ingested,
            listings = fresh.listings,
            priced = fresh.priced,
            skipped = fresh.skipped,
            failures = fresh.failures,
            "fresh ingest pass"
        );

        let refreshed = self.ingest.refresh_pass().await;
        info!(
            candidates = refreshed.candidates,
            ingested = refreshed.ingested,
            listings = refreshed.listings,
            priced = refreshed.priced,
            skipped = refreshed.skipped,
            failures = refreshed.failures,
            "refresh ingest pass"
        );
    }

    async fn pause(&self) {
        let secs = rand::rng().random_range(self.min_delay_secs..=self.max_delay_secs);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogService;
    use domains::ports::{MockListingIndex, MockPeerGateway, MockPeerStore, MockRateSource};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_discovery_phase_runs_every_pass_once() {
        let mut gateway = MockPeerGateway::new();
        gateway
            .expect_connected_peers()
            .times(1)
            .returning(|| Ok(vec![]));
        gateway
            .expect_follow_peers()
            .times(1)
            .returning(|| Ok(vec![]));

        let mut store = MockPeerStore::new();
        store.expect_staged_peers().times(1).returning(|| Ok(vec![]));

        let discovery = DiscoveryService::new(Arc::new(gateway), Arc::new(store), 100);
        let ingest = idle_ingest();
        let scheduler = Scheduler::new(discovery, ingest, 10, 100);

        scheduler.discovery_phase().await;
    }

    #[tokio::test]
    async fn test_ingest_phase_runs_fresh_then_refresh() {
        let mut store = MockPeerStore::new();
        store.expect_staged_peers().times(1).returning(|| Ok(vec![]));
        store
            .expect_ingested_peers()
            .times(2)
            .returning(|| Ok(vec![]));

        let store = Arc::new(store);
        let index = Arc::new(MockListingIndex::new());
        let ingest = IngestService::new(
            Arc::new(MockPeerGateway::new()),
            store.clone(),
            CatalogService::new(index, store.clone()),
            Arc::new(MockRateSource::new()),
            150,
            50,
        );
        let discovery = DiscoveryService::new(
            Arc::new(MockPeerGateway::new()),
            Arc::new(MockPeerStore::new()),
            100,
        );
        let scheduler = Scheduler::new(discovery, ingest, 10, 100);

        scheduler.ingest_phase().await;
    }

    fn idle_ingest() -> IngestService {
        let store = Arc::new(MockPeerStore::new());
        IngestService::new(
            Arc::new(MockPeerGateway::new()),
            store.clone(),
            CatalogService::new(Arc::new(MockListingIndex::new()), store.clone()),
            Arc::new(MockRateSource::new()),
            150,
            50,
        )
    }
}
