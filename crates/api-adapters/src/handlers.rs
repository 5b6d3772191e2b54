//! # Search API handlers
//!
//! Public read surface over the listings index, plus abuse report
//! intake. Responses wrap hits in the provider envelope marketplace
//! clients expect, so this service can sit behind any client that
//! already speaks to other search providers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use domains::error::{IndexError, StoreError};
use domains::models::{PeerId, Report};
use domains::ports::{ListingIndex, PeerStore};
use domains::search::{SearchPage, SearchQuery, SearchSort};

use crate::metrics::Metrics;

/// Facts shown in the provider block of every search response.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub logo_url: String,
    pub listings_url: String,
    pub reports_url: String,
}

#[derive(Clone)]
pub struct ApiState {
    pub index: Arc<dyn ListingIndex>,
    pub store: Arc<dyn PeerStore>,
    pub provider: Arc<ProviderInfo>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal error"})),
        )
            .into_response()
    }
}

/// Query string of `GET /`. Multi-value filters arrive comma-separated;
/// the page size defaults to zero, so clients state how much they want.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    pub q: String,
    pub p: usize,
    pub ps: usize,
    pub sort_by: String,
    pub ships_to: String,
    pub accepted_currencies: String,
    pub contract_types: String,
    pub nsfw: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            q: "*".to_owned(),
            p: 0,
            ps: 0,
            sort_by: "relevance".to_owned(),
            ships_to: "any".to_owned(),
            accepted_currencies: String::new(),
            contract_types: String::new(),
            nsfw: false,
        }
    }
}

impl SearchParams {
    fn into_query(self) -> SearchQuery {
        let ships_to = if self.ships_to.is_empty() || self.ships_to.eq_ignore_ascii_case("any") {
            None
        } else {
            Some(self.ships_to.to_ascii_uppercase())
        };
        SearchQuery {
            term: self.q,
            page: self.p,
            page_size: self.ps,
            sort: SearchSort::parse(&self.sort_by),
            ships_to,
            accepted_currencies: csv_upper(&self.accepted_currencies),
            contract_types: csv_upper(&self.contract_types),
            include_nsfw: self.nsfw,
        }
    }
}

fn csv_upper(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

fn search_response(provider: &ProviderInfo, page: &SearchPage) -> Value {
    let results: Vec<Value> = page
        .hits
        .iter()
        .map(|hit| {
            json!({
                "type": "listing",
                "data": hit.listing_data,
                "relationships": {
                    "vendor": {"data": hit.peer_data},
                    "moderators": hit.moderators
                }
            })
        })
        .collect();

    json!({
        "name": provider.name,
        "logo": provider.logo_url,
        "links": {
            "listings": provider.listings_url,
            "reports": provider.reports_url
        },
        "results": {
            "total": page.total,
            "morePages": page.more_pages,
            "results": results
        }
    })
}

/// `GET /` runs a listings search.
async fn search(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.into_query();
    let page = state.index.search(&query).await?;
    state.metrics.searches.inc();
    Ok(Json(search_response(&state.provider, &page)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Older clients spell this `peerID`; both decode.
    #[serde(alias = "peerID")]
    pub peer_id: String,
    pub slug: String,
    pub reason: String,
}

/// `POST /reports` files an abuse report against a listing. Replies 201
/// with an empty object; duplicates are accepted quietly.
async fn submit_report(
    State(state): State<ApiState>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let report = Report {
        peer_id: PeerId::new(request.peer_id),
        slug: request.slug,
        reason: request.reason,
        submitted_at: Utc::now(),
    };
    state.store.insert_report(&report).await?;
    state.metrics.reports.inc();
    info!(peer = %report.peer_id, slug = %report.slug, "abuse report accepted");
    Ok((StatusCode::CREATED, Json(json!({}))))
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /stats` reports catalog size from the relational store.
async fn stats(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let peers = state.store.count_peers().await?;
    let listings = state.store.count_listings().await?;
    Ok(Json(json!({"peers": peers, "listings": listings})))
}

async fn render_metrics(State(state): State<ApiState>) -> String {
    state.metrics.render()
}

/// Builds the search API router with request tracing and permissive
/// CORS.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(search))
        .route("/reports", post(submit_report))
        .route("/healthz", get(healthz))
        .route("/stats", get(stats))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
