//! # Domain Models
//!
//! These structs represent the entities flowing through the crawl and
//! ingestion pipeline. Identifiers are minted by remote peers, never by
//! this system. Wire documents type the fields the pipeline reads and
//! preserve everything else verbatim in a flattened `extra` bucket.

use serde::{Deserialize, Serialize};

/// Network identity of a peer, as published by the peer itself.
///
/// Opaque to this system: the only operations are equality and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Content hash of a listing; globally unique across peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Public profile document a peer publishes about itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_hashes: serde_json::Value,
    /// Remainder of the profile document, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Price block as published in a listing summary (minor units).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingPrice {
    pub amount: i64,
    pub currency_code: String,
    pub modifier: f64,
}

/// One entry of a peer's listing index.
///
/// Only `hash` is required; a summary without it has no identity and is
/// dropped at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub hash: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub ships_to: Vec<String>,
    #[serde(default)]
    pub accepted_currencies: Vec<String>,
    #[serde(default)]
    pub thumbnail: serde_json::Value,
    #[serde(default)]
    pub price: ListingPrice,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub rating_count: i64,
    #[serde(default)]
    pub free_shipping: Vec<String>,
    #[serde(default)]
    pub coin_type: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full listing record fetched per hash, unwrapped from the node's
/// `listing` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default)]
    pub item: ListingItem,
    #[serde(default)]
    pub metadata: ListingMetadata,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingItem {
    pub condition: String,
    /// Declared price in minor units of the pricing currency.
    pub price: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingMetadata {
    /// Empty means the listing is unpriced and the rate step skips it.
    pub pricing_currency: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Compact projection of a listing shown on result pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayCard {
    pub hash: String,
    pub slug: String,
    pub title: String,
    pub thumbnail: serde_json::Value,
    pub language: String,
    pub price: ListingPrice,
    pub average_rating: f64,
    pub rating_count: i64,
    pub free_shipping: Vec<String>,
    pub coin_type: String,
    pub nsfw: bool,
}

/// A fully ingested listing: the index summary joined with the detailed
/// record fetched for its hash.
///
/// `summary` and `detail` hold the source documents re-serialized, so
/// storage keeps everything the peer published even where no typed
/// field exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
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
    /// Currency the peer priced the item in; empty means unpriced.
    pub pricing_currency: String,
    /// Declared price in minor units of `pricing_currency`.
    pub price_amount: i64,
    pub display: DisplayCard,
    pub summary: serde_json::Value,
    pub detail: serde_json::Value,
}

impl Listing {
    /// Joins an index summary with the detail record fetched for it.
    pub fn from_parts(peer: &PeerId, summary: ListingSummary, detail: ListingDetail) -> Self {
        let raw_summary = serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null);
        let raw_detail = serde_json::to_value(&detail).unwrap_or(serde_json::Value::Null);

        let display = DisplayCard {
            hash: summary.hash.clone(),
            slug: summary.slug,
            title: summary.title,
            thumbnail: summary.thumbnail,
            language: summary.language.clone(),
            price: summary.price,
            average_rating: summary.average_rating,
            rating_count: summary.rating_count,
            free_shipping: summary.free_shipping,
            coin_type: summary.coin_type,
            nsfw: summary.nsfw,
        };

        Self {
            id: ListingId::new(summary.hash),
            peer_id: peer.clone(),
            description: summary.description,
            tags: summary.tags,
            categories: summary.categories,
            contract_type: summary.contract_type,
            language: summary.language,
            ships_to: summary.ships_to,
            condition: detail.item.condition,
            accepted_currencies: summary.accepted_currencies,
            moderators: detail.moderators,
            pricing_currency: detail.metadata.pricing_currency,
            price_amount: detail.item.price,
            display,
            summary: raw_summary,
            detail: raw_detail,
        }
    }
}

/// Abuse report filed against a listing through the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub peer_id: PeerId,
    pub slug: String,
    pub reason: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Identity block of the local node, from its config endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub peer_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
