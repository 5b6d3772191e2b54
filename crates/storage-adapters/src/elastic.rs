//! # Listings search index
//!
//! Search half of the dual store, speaking the Elasticsearch REST
//! dialect over plain HTTP. Documents are full-replaced per ingestion;
//! the satoshi price is the only field patched in place.

use async_trait::async_trait;
use futures_util::future::join_all;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use domains::error::{IndexError, IndexResult};
use domains::models::{Listing, ListingId, PeerId, PeerProfile};
use domains::ports::ListingIndex;
use domains::search::{PeerSnapshot, SearchDocument, SearchHit, SearchPage, SearchQuery, SearchSort};

pub struct ElasticIndex {
    http: reqwest::Client,
    base: String,
    index: String,
}

fn index_err(e: reqwest::Error) -> IndexError {
    IndexError::Backend(e.to_string())
}

async fn backend_status(response: reqwest::Response) -> IndexError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    IndexError::Backend(format!("{status}: {snippet}"))
}

impl ElasticIndex {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            http,
            base: base_url.into().trim_end_matches('/').to_owned(),
            index: index.into(),
        }
    }

    /// Blocks until the index answers a root ping, sleeping a uniform
    /// 1-5s between attempts.
    pub async fn wait_until_ready(&self) {
        loop {
            match self.http.get(&self.base).send().await {
                Ok(r) if r.status().is_success() => {
                    info!("search index reachable");
                    return;
                }
                Ok(r) => warn!(status = %r.status(), "search index not ready, retrying"),
                Err(e) => warn!(error = %e, "search index not ready, retrying"),
            }
            let pause = rand::rng().random_range(1_000..=5_000);
            tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
        }
    }

    /// Creates the listings index with its mapping. An index that
    /// already exists is left as is.
    pub async fn ensure_index(&self) -> IndexResult<()> {
        let url = format!("{}/{}", self.base, self.index);
        let response = self
            .http
            .put(&url)
            .json(&index_mapping())
            .send()
            .await
            .map_err(index_err)?;

        if response.status().is_success() {
            return Ok(());
        }

        let body: Value = response.json().await.map_err(index_err)?;
        if body.pointer("/error/type").and_then(Value::as_str)
            == Some("resource_already_exists_exception")
        {
            return Ok(());
        }
        Err(IndexError::Backend(format!("index creation rejected: {body}")))
    }
}

/// Explicit mapping for the listings index. Shapes here must stay in
/// step with `SearchDocument`.
fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "listingId":          {"type": "keyword"},
                "peerId":             {"type": "keyword"},
                "description":        {"type": "text"},
                "tags":               {"type": "text"},
                "categories":         {"type": "text"},
                "contractType":       {"type": "keyword"},
                "language":           {"type": "keyword"},
                "shipsTo":            {"type": "keyword"},
                "condition":          {"type": "keyword"},
                "acceptedCurrencies": {"type": "keyword"},
                "moderators":         {"type": "keyword"},
                "equivalentBtcPrice": {"type": "long"},
                "listingData": {
                    "properties": {
                        "hash":      {"type": "keyword"},
                        "slug":      {"type": "keyword"},
                        "title":     {"type": "text"},
                        "thumbnail": {
                            "properties": {
                                "tiny":  {"type": "keyword"},
                                "small": {"type": "keyword"}
                            }
                        },
                        "language": {"type": "keyword"},
                        "price": {
                            "properties": {
                                "amount":       {"type": "long"},
                                "currencyCode": {"type": "keyword"},
                                "modifier":     {"type": "float"}
                            }
                        },
                        "averageRating": {"type": "float"},
                        "ratingCount":   {"type": "long"},
                        "freeShipping":  {"type": "keyword"},
                        "coinType":      {"type": "keyword"},
                        "nsfw":          {"type": "boolean"}
                    }
                },
                "peerData": {
                    "properties": {
                        "peerId": {"type": "keyword"},
                        "name":   {"type": "text"},
                        "avatarHashes": {
                            "properties": {
                                "tiny":  {"type": "keyword"},
                                "small": {"type": "keyword"}
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Translates a query into the request body the index executes.
fn search_body(query: &SearchQuery) -> Value {
    let must = if query.term.is_empty() || query.term == "*" {
        json!({"match_all": {}})
    } else {
        json!({"multi_match": {
            "query": query.term,
            "fields": ["listingData.title^5", "tags^2", "description", "peerData.name"]
        }})
    };

    let mut filter = Vec::new();
    if let Some(code) = &query.ships_to {
        // A destination matches listings shipping there or anywhere.
        filter.push(json!({"bool": {"should": [
            {"term": {"shipsTo": code}},
            {"term": {"shipsTo": "ANY"}}
        ]}}));
    }
    if !query.accepted_currencies.is_empty() {
        let should: Vec<Value> = query
            .accepted_currencies
            .iter()
            .map(|c| json!({"term": {"acceptedCurrencies": c}}))
            .collect();
        filter.push(json!({"bool": {"should": should}}));
    }
    if !query.contract_types.is_empty() {
        let should: Vec<Value> = query
            .contract_types
            .iter()
            .map(|t| json!({"term": {"contractType": t}}))
            .collect();
        filter.push(json!({"bool": {"should": should}}));
    }
    if !query.include_nsfw {
        filter.push(json!({"term": {"listingData.nsfw": false}}));
    }

    let sort = match query.sort {
        SearchSort::Relevance => json!([{"_score": "desc"}]),
        SearchSort::PriceAsc => json!([{"equivalentBtcPrice": "asc"}]),
        SearchSort::PriceDesc => json!([{"equivalentBtcPrice": "desc"}]),
    };

    json!({
        "from": query.page * query.page_size,
        "size": query.page_size,
        "_source": ["listingData", "peerData", "moderators", "equivalentBtcPrice"],
        "query": {"bool": {"must": must, "filter": filter}},
        "sort": sort
    })
}

#[async_trait]
impl ListingIndex for ElasticIndex {
    async fn index_listings(
        &self,
        peer: &PeerId,
        profile: &PeerProfile,
        listings: &[Listing],
    ) -> IndexResult<()> {
        let snapshot = PeerSnapshot::from_profile(peer, profile);
        let writes = listings.iter().map(|listing| {
            let doc = SearchDocument::project(listing, &snapshot);
            async move {
                let url = format!("{}/{}/_doc/{}", self.base, self.index, doc.listing_id);
                let response = self
                    .http
                    .put(&url)
                    .json(&doc)
                    .send()
                    .await
                    .map_err(index_err)?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(backend_status(response).await)
                }
            }
        });
        join_all(writes).await.into_iter().collect()
    }

    async fn update_price(&self, listing: &ListingId, sats: i64) -> IndexResult<bool> {
        let url = format!("{}/{}/_update/{}", self.base, self.index, listing);
        let response = self
            .http
            .post(&url)
            .json(&json!({"doc": {"equivalentBtcPrice": sats}}))
            .send()
            .await
            .map_err(index_err)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if response.status().is_success() {
            return Ok(true);
        }
        Err(backend_status(response).await)
    }

    async fn search(&self, query: &SearchQuery) -> IndexResult<SearchPage> {
        let url = format!("{}/{}/_search", self.base, self.index);
        let response = self
            .http
            .post(&url)
            .json(&search_body(query))
            .send()
            .await
            .map_err(index_err)?;
        if !response.status().is_success() {
            return Err(backend_status(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Malformed(e.to_string()))?;
        let total = body
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let raw_hits = match body.pointer("/hits/hits") {
            Some(Value::Array(hits)) => hits.clone(),
            _ => Vec::new(),
        };

        let mut hits = Vec::with_capacity(raw_hits.len());
        for mut hit in raw_hits {
            let source = hit.get_mut("_source").map(Value::take).unwrap_or(Value::Null);
            match serde_json::from_value::<SearchHit>(source) {
                Ok(hit) => hits.push(hit),
                Err(e) => debug!(error = %e, "dropping undecodable search hit"),
            }
        }

        let shown = (query.page * query.page_size + query.page_size) as u64;
        Ok(SearchPage {
            total,
            more_pages: shown < total,
            hits,
        })
    }
}
