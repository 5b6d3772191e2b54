//! # souk-searchd
//!
//! Serves the public search API over the catalog the crawler maintains.

use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use api_adapters::handlers::{router, ApiState, ProviderInfo};
use api_adapters::metrics::Metrics;
use configs::Settings;
use storage_adapters::{ElasticIndex, PgPeerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing and load configuration
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();
    let settings = Settings::load().context("loading configuration")?;

    // 2. Connect both halves of the dual store
    let store = PgPeerStore::connect_with_retry(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
    )
    .await;
    store.ensure_schema().await.context("creating schema")?;

    let index = ElasticIndex::new(
        reqwest::Client::new(),
        settings.search.url.clone(),
        settings.search.index.clone(),
    );
    index.wait_until_ready().await;
    index.ensure_index().await.context("creating search index")?;

    // 3. Assemble shared state and the router
    let state = ApiState {
        index: Arc::new(index),
        store: Arc::new(store),
        provider: Arc::new(ProviderInfo {
            name: settings.api.name.clone(),
            logo_url: settings.api.logo_url.clone(),
            listings_url: settings.api.listings_url.clone(),
            reports_url: settings.api.reports_url.clone(),
        }),
        metrics: Arc::new(Metrics::new()),
    };
    let app = router(state);

    // 4. Serve until killed
    let listener = tokio::net::TcpListener::bind(&settings.api.bind)
        .await
        .with_context(|| format!("binding {}", settings.api.bind))?;
    tracing::info!(addr = %settings.api.bind, "🚀 souk-searchd started");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
