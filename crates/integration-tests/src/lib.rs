//! souk-search/crates/integration-tests/src/lib.rs
//!
//! In-memory fakes shared by the pipeline integration tests. They
//! implement the domain ports with plain maps behind a mutex, so a
//! whole crawl cycle runs single-process with no node, no Postgres and
//! no search cluster.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use domains::error::{
    GatewayError, GatewayResult, IndexResult, RateError, RateResult, StoreResult,
};
use domains::models::{
    Listing, ListingDetail, ListingId, ListingSummary, NodeInfo, PeerId, PeerProfile, Report,
};
use domains::ports::{ListingIndex, PeerGateway, PeerStore, RateSource};
use domains::search::{PeerSnapshot, SearchDocument, SearchHit, SearchPage, SearchQuery, SearchSort};
use services::{CatalogService, DiscoveryService, IngestService};

// ---------------------------------------------------------------------
// Relational store fake
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPeerStore {
    inner: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    staged: BTreeSet<PeerId>,
    profiles: BTreeMap<PeerId, PeerProfile>,
    listings: BTreeMap<ListingId, Listing>,
    prices: BTreeMap<ListingId, i64>,
    reports: Vec<Report>,
}

impl MemoryPeerStore {
    pub fn staged(&self) -> BTreeSet<PeerId> {
        self.inner.lock().expect("lock").staged.clone()
    }

    pub fn listing_ids(&self) -> Vec<ListingId> {
        self.inner.lock().expect("lock").listings.keys().cloned().collect()
    }

    pub fn price_of(&self, id: &ListingId) -> Option<i64> {
        self.inner.lock().expect("lock").prices.get(id).copied()
    }

    pub fn profile_of(&self, peer: &PeerId) -> Option<PeerProfile> {
        self.inner.lock().expect("lock").profiles.get(peer).cloned()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.inner.lock().expect("lock").reports.clone()
    }
}

#[async_trait]
impl PeerStore for MemoryPeerStore {
    async fn stage_peers(&self, peers: &[PeerId]) -> StoreResult<u64> {
        let mut state = self.inner.lock().expect("lock");
        let mut added = 0;
        for peer in peers {
            if state.staged.insert(peer.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn is_staged(&self, peer: &PeerId) -> StoreResult<bool> {
        Ok(self.inner.lock().expect("lock").staged.contains(peer))
    }

    async fn staged_peers(&self) -> StoreResult<Vec<PeerId>> {
        Ok(self.inner.lock().expect("lock").staged.iter().cloned().collect())
    }

    async fn ingested_peers(&self) -> StoreResult<Vec<PeerId>> {
        Ok(self.inner.lock().expect("lock").profiles.keys().cloned().collect())
    }

    async fn upsert_peer(&self, peer: &PeerId, profile: &PeerProfile) -> StoreResult<()> {
        self.inner
            .lock()
            .expect("lock")
            .profiles
            .insert(peer.clone(), profile.clone());
        Ok(())
    }

    async fn upsert_listings(&self, _peer: &PeerId, listings: &[Listing]) -> StoreResult<()> {
        let mut state = self.inner.lock().expect("lock");
        for listing in listings {
            state.listings.insert(listing.id.clone(), listing.clone());
        }
        Ok(())
    }

    async fn set_listing_price(&self, listing: &ListingId, sats: i64) -> StoreResult<bool> {
        let mut state = self.inner.lock().expect("lock");
        if !state.listings.contains_key(listing) {
            return Ok(false);
        }
        state.prices.insert(listing.clone(), sats);
        Ok(true)
    }

    async fn insert_report(&self, report: &Report) -> StoreResult<()> {
        let mut state = self.inner.lock().expect("lock");
        let duplicate = state.reports.iter().any(|existing| {
            existing.peer_id == report.peer_id
                && existing.slug == report.slug
                && existing.submitted_at == report.submitted_at
        });
        if !duplicate {
            state.reports.push(report.clone());
        }
        Ok(())
    }

    async fn count_peers(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().expect("lock").profiles.len() as i64)
    }

    async fn count_listings(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().expect("lock").listings.len() as i64)
    }
}

// ---------------------------------------------------------------------
// Search index fake
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryIndex {
    inner: Mutex<BTreeMap<ListingId, SearchDocument>>,
}

impl MemoryIndex {
    pub fn doc(&self, id: &ListingId) -> Option<SearchDocument> {
        self.inner.lock().expect("lock").get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListingIndex for MemoryIndex {
    /// Full-document replace, like the real index: a re-indexed listing
    /// goes back to a zero price until the next rate refresh.
    async fn index_listings(
        &self,
        peer: &PeerId,
        profile: &PeerProfile,
        listings: &[Listing],
    ) -> IndexResult<()> {
        let snapshot = PeerSnapshot::from_profile(peer, profile);
        let mut docs = self.inner.lock().expect("lock");
        for listing in listings {
            docs.insert(listing.id.clone(), SearchDocument::project(listing, &snapshot));
        }
        Ok(())
    }

    async fn update_price(&self, listing: &ListingId, sats: i64) -> IndexResult<bool> {
        let mut docs = self.inner.lock().expect("lock");
        match docs.get_mut(listing) {
            Some(doc) => {
                doc.equivalent_btc_price = sats;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search(&self, query: &SearchQuery) -> IndexResult<SearchPage> {
        let docs = self.inner.lock().expect("lock");
        let term = query.term.to_ascii_lowercase();

        let mut matched: Vec<&SearchDocument> = docs
            .values()
            .filter(|doc| {
                let text = term.is_empty()
                    || term == "*"
                    || doc.listing_data.title.to_ascii_lowercase().contains(&term)
                    || doc.description.to_ascii_lowercase().contains(&term)
                    || doc.tags.iter().any(|t| t.to_ascii_lowercase().contains(&term));
                let ships = query.ships_to.as_ref().map_or(true, |code| {
                    doc.ships_to
                        .iter()
                        .any(|d| d.eq_ignore_ascii_case(code) || d.eq_ignore_ascii_case("any"))
                });
                let currency = query.accepted_currencies.is_empty()
                    || doc.accepted_currencies.iter().any(|c| {
                        query.accepted_currencies.iter().any(|q| c.eq_ignore_ascii_case(q))
                    });
                let contract = query.contract_types.is_empty()
                    || query
                        .contract_types
                        .iter()
                        .any(|t| doc.contract_type.eq_ignore_ascii_case(t));
                let nsfw = query.include_nsfw || !doc.listing_data.nsfw;
                text && ships && currency && contract && nsfw
            })
            .collect();

        match query.sort {
            SearchSort::PriceAsc => matched.sort_by_key(|doc| doc.equivalent_btc_price),
            SearchSort::PriceDesc => {
                matched.sort_by_key(|doc| std::cmp::Reverse(doc.equivalent_btc_price))
            }
            SearchSort::Relevance => {}
        }

        let total = matched.len() as u64;
        let hits: Vec<SearchHit> = matched
            .into_iter()
            .skip(query.page * query.page_size)
            .take(query.page_size)
            .map(|doc| SearchHit {
                listing_data: doc.listing_data.clone(),
                peer_data: doc.peer_data.clone(),
                moderators: doc.moderators.clone(),
                equivalent_btc_price: doc.equivalent_btc_price,
            })
            .collect();

        Ok(SearchPage {
            total,
            more_pages: ((query.page * query.page_size + query.page_size) as u64) < total,
            hits,
        })
    }
}

// ---------------------------------------------------------------------
// Gateway and rate fakes
// ---------------------------------------------------------------------

/// A small peer network served from memory. Anything absent from the
/// maps behaves like an unreachable peer.
#[derive(Default)]
pub struct ScriptedGateway {
    pub connected: Vec<PeerId>,
    pub follows: Vec<PeerId>,
    pub neighbors: HashMap<PeerId, Vec<PeerId>>,
    pub online: BTreeSet<PeerId>,
    pub profiles: HashMap<PeerId, PeerProfile>,
    pub indexes: HashMap<PeerId, Vec<ListingSummary>>,
    pub details: HashMap<(PeerId, String), ListingDetail>,
}

#[async_trait]
impl PeerGateway for ScriptedGateway {
    async fn connected_peers(&self) -> GatewayResult<Vec<PeerId>> {
        Ok(self.connected.clone())
    }

    async fn follow_peers(&self) -> GatewayResult<Vec<PeerId>> {
        Ok(self.follows.clone())
    }

    async fn neighbors_of(&self, peer: &PeerId) -> GatewayResult<Vec<PeerId>> {
        Ok(self.neighbors.get(peer).cloned().unwrap_or_default())
    }

    async fn peer_online(&self, peer: &PeerId) -> bool {
        self.online.contains(peer)
    }

    async fn fetch_profile(&self, peer: &PeerId) -> GatewayResult<PeerProfile> {
        self.profiles.get(peer).cloned().ok_or(GatewayError::Timeout)
    }

    async fn listing_index(&self, peer: &PeerId) -> GatewayResult<Vec<ListingSummary>> {
        self.indexes.get(peer).cloned().ok_or(GatewayError::Timeout)
    }

    async fn listing_detail(&self, peer: &PeerId, hash: &str) -> GatewayResult<ListingDetail> {
        self.details
            .get(&(peer.clone(), hash.to_owned()))
            .cloned()
            .ok_or(GatewayError::Timeout)
    }

    async fn node_config(&self) -> GatewayResult<NodeInfo> {
        Ok(NodeInfo::default())
    }
}

/// Fixed conversion table: BTC per one major unit of each currency.
pub struct FixedRates {
    per_major_unit: HashMap<String, f64>,
}

impl FixedRates {
    pub fn new(rates: &[(&str, f64)]) -> Self {
        Self {
            per_major_unit: rates
                .iter()
                .map(|(code, rate)| (code.to_ascii_uppercase(), *rate))
                .collect(),
        }
    }
}

#[async_trait]
impl RateSource for FixedRates {
    async fn to_btc(&self, currency: &str, amount: f64) -> RateResult<f64> {
        if currency.eq_ignore_ascii_case("BTC") {
            return Ok(amount);
        }
        self.per_major_unit
            .get(&currency.to_ascii_uppercase())
            .map(|rate| rate * amount)
            .ok_or_else(|| RateError::Malformed(format!("no rate for {currency}")))
    }
}

// ---------------------------------------------------------------------
// Fixtures and assembly
// ---------------------------------------------------------------------

/// Listing index entry with enough typed fields for search assertions.
pub fn summary(hash: &str, title: &str) -> ListingSummary {
    serde_json::from_value(json!({
        "hash": hash,
        "slug": title.to_ascii_lowercase().replace(' ', "-"),
        "title": title,
        "description": format!("{title}, hand made"),
        "tags": ["woodwork"],
        "contractType": "PHYSICAL_GOOD",
        "shipsTo": ["US", "DE"],
        "acceptedCurrencies": ["BTC"],
        "price": {"amount": 1000, "currencyCode": "USD"},
        "nsfw": false
    }))
    .expect("summary fixture")
}

pub fn detail(currency: &str, minor_units: i64) -> ListingDetail {
    serde_json::from_value(json!({
        "moderators": [],
        "item": {"condition": "New", "price": minor_units},
        "metadata": {"pricingCurrency": currency}
    }))
    .expect("detail fixture")
}

pub fn profile(name: &str) -> PeerProfile {
    serde_json::from_value(json!({
        "name": name,
        "avatarHashes": {"tiny": "QmAvatarTiny"}
    }))
    .expect("profile fixture")
}

/// Wires the full pipeline over in-memory backends and hands the store
/// and index back for assertions.
pub fn pipeline(
    gateway: Arc<dyn PeerGateway>,
    rates: Arc<dyn RateSource>,
) -> (
    DiscoveryService,
    IngestService,
    Arc<MemoryPeerStore>,
    Arc<MemoryIndex>,
) {
    let store = Arc::new(MemoryPeerStore::default());
    let index = Arc::new(MemoryIndex::default());
    let discovery = DiscoveryService::new(gateway.clone(), store.clone(), 100);
    let ingest = IngestService::new(
        gateway,
        store.clone(),
        CatalogService::new(index.clone(), store.clone()),
        rates,
        150,
        50,
    );
    (discovery, ingest, store, index)
}
