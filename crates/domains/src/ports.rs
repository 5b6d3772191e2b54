//! # Ports
//!
//! Contracts between the pipeline and its adapters. Any backend must
//! implement one of these to be wired into the binaries.

use async_trait::async_trait;

use crate::error::{GatewayResult, IndexResult, RateResult, StoreResult};
use crate::models::{
    Listing, ListingDetail, ListingId, ListingSummary, NodeInfo, PeerId, PeerProfile, Report,
};
use crate::search::{SearchPage, SearchQuery};

/// Read side of the local node's HTTP API.
///
/// Multi-endpoint unions (`follow_peers`, `neighbors_of`) treat a
/// failed leg as empty; single-endpoint calls surface a typed
/// `GatewayError`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PeerGateway: Send + Sync {
    // Topology
    async fn connected_peers(&self) -> GatewayResult<Vec<PeerId>>;
    async fn follow_peers(&self) -> GatewayResult<Vec<PeerId>>;
    async fn neighbors_of(&self, peer: &PeerId) -> GatewayResult<Vec<PeerId>>;
    /// Liveness probe; any failure counts as offline.
    async fn peer_online(&self, peer: &PeerId) -> bool;

    // Marketplace data
    async fn fetch_profile(&self, peer: &PeerId) -> GatewayResult<PeerProfile>;
    /// The peer's listing index. Entries that do not decode are dropped.
    async fn listing_index(&self, peer: &PeerId) -> GatewayResult<Vec<ListingSummary>>;
    async fn listing_detail(&self, peer: &PeerId, hash: &str) -> GatewayResult<ListingDetail>;

    /// Identity of the node this gateway talks to.
    async fn node_config(&self) -> GatewayResult<NodeInfo>;
}

/// Relational persistence for staged peers, ingested peers, listings,
/// and reports.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PeerStore: Send + Sync {
    // Staging
    /// Stages newly discovered peers. Already-staged ids are accepted
    /// silently; returns how many rows were actually new.
    async fn stage_peers(&self, peers: &[PeerId]) -> StoreResult<u64>;
    async fn is_staged(&self, peer: &PeerId) -> StoreResult<bool>;
    async fn staged_peers(&self) -> StoreResult<Vec<PeerId>>;
    /// Peers that have completed at least one ingestion.
    async fn ingested_peers(&self) -> StoreResult<Vec<PeerId>>;

    // Catalog
    async fn upsert_peer(&self, peer: &PeerId, profile: &PeerProfile) -> StoreResult<()>;
    async fn upsert_listings(&self, peer: &PeerId, listings: &[Listing]) -> StoreResult<()>;
    /// Returns whether a listing row matched.
    async fn set_listing_price(&self, listing: &ListingId, sats: i64) -> StoreResult<bool>;

    // Reports and counters
    async fn insert_report(&self, report: &Report) -> StoreResult<()>;
    async fn count_peers(&self) -> StoreResult<i64>;
    async fn count_listings(&self) -> StoreResult<i64>;
}

/// Search-index side of the dual store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ListingIndex: Send + Sync {
    /// Full-document replace of every listing in the batch, embedding a
    /// fresh snapshot of the owning peer's profile.
    async fn index_listings(
        &self,
        peer: &PeerId,
        profile: &PeerProfile,
        listings: &[Listing],
    ) -> IndexResult<()>;

    /// Partial update of the satoshi price; `false` when the document
    /// is gone.
    async fn update_price(&self, listing: &ListingId, sats: i64) -> IndexResult<bool>;

    async fn search(&self, query: &SearchQuery) -> IndexResult<SearchPage>;
}

/// Converts an amount of some currency into BTC.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    /// `amount` is in major units of `currency`. BTC converts to itself
    /// without a remote call.
    async fn to_btc(&self, currency: &str, amount: f64) -> RateResult<f64>;
}
