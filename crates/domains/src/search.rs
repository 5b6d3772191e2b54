//! # Search Shapes
//!
//! Document and query types shared by the index adapter and the search
//! API. Field names serialize in camelCase; the index mapping, the
//! stored documents, and the HTTP result pages all use the same names.

use serde::{Deserialize, Serialize};

use crate::models::{DisplayCard, Listing, ListingId, PeerId, PeerProfile};

/// Snapshot of a peer's public identity, embedded in every document the
/// peer owns. Refreshed whenever the peer is re-ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSnapshot {
    pub peer_id: PeerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_hashes: serde_json::Value,
}

impl PeerSnapshot {
    pub fn from_profile(peer: &PeerId, profile: &PeerProfile) -> Self {
        let avatar_hashes = match &profile.avatar_hashes {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            v => v.clone(),
        };
        Self {
            peer_id: peer.clone(),
            name: profile.name.clone(),
            avatar_hashes,
        }
    }
}

/// Document stored in the listings index, one per listing, fully
/// replaced on every ingestion of the owning peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub listing_id: ListingId,
    pub peer_id: PeerId,
    pub description: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub contract_type: String,
    pub language: String,
    pub ships_to: Vec<String>,
    pub condition: String,
    pub accepted_currencies: Vec<String>,
    pub moderators: Vec<String>,
    /// Satoshi price; zero until the first rate refresh lands.
    pub equivalent_btc_price: i64,
    pub listing_data: DisplayCard,
    pub peer_data: PeerSnapshot,
}

impl SearchDocument {
    /// Projects a listing plus its peer snapshot into the index shape.
    pub fn project(listing: &Listing, peer_data: &PeerSnapshot) -> Self {
        Self {
            listing_id: listing.id.clone(),
            peer_id: listing.peer_id.clone(),
            description: listing.description.clone(),
            tags: listing.tags.clone(),
            categories: listing.categories.clone(),
            contract_type: listing.contract_type.clone(),
            language: listing.language.clone(),
            ships_to: listing.ships_to.clone(),
            condition: listing.condition.clone(),
            accepted_currencies: listing.accepted_currencies.clone(),
            moderators: listing.moderators.clone(),
            equivalent_btc_price: 0,
            listing_data: listing.display.clone(),
            peer_data: peer_data.clone(),
        }
    }
}

/// Sort order accepted by the search surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchSort {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
}

impl SearchSort {
    /// Unrecognized values fall back to relevance.
    pub fn parse(value: &str) -> Self {
        match value {
            "price-asc" => Self::PriceAsc,
            "price-desc" => Self::PriceDesc,
            _ => Self::Relevance,
        }
    }
}

/// A translated search request against the listings index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Free-text term; `*` or empty matches everything.
    pub term: String,
    pub page: usize,
    pub page_size: usize,
    pub sort: SearchSort,
    /// Uppercased destination filter; `None` means anywhere.
    pub ships_to: Option<String>,
    /// Uppercased currency codes, OR-combined.
    pub accepted_currencies: Vec<String>,
    /// Uppercased contract types, OR-combined.
    pub contract_types: Vec<String>,
    pub include_nsfw: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: "*".to_owned(),
            page: 0,
            page_size: 0,
            sort: SearchSort::Relevance,
            ships_to: None,
            accepted_currencies: Vec::new(),
            contract_types: Vec::new(),
            include_nsfw: false,
        }
    }
}

/// The slice of a document the index returns on result pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(default)]
    pub listing_data: DisplayCard,
    pub peer_data: PeerSnapshot,
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default)]
    pub equivalent_btc_price: i64,
}

/// One page of hits plus the facts pagination needs.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub total: u64,
    /// Whether another page exists past this one.
    pub more_pages: bool,
    pub hits: Vec<SearchHit>,
}
