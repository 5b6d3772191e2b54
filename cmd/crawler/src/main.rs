//! # souk-crawler
//!
//! Walks the Souk peer network through the local node and keeps the
//! relational catalog and the search index in step.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrecy::ExposeSecret;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use configs::{BootstrapPolicy, Settings};
use domains::ports::PeerGateway;
use gateway_adapters::{BlockchainRateSource, NodeGateway, NodeGatewayConfig, RateSourceConfig};
use services::{CatalogService, DiscoveryService, IngestService, Scheduler};
use storage_adapters::{ElasticIndex, PgPeerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing and load configuration
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();
    let settings = Settings::load().context("loading configuration")?;

    // 2. Connect the dual store; schema and index are created if missing
    let store = PgPeerStore::connect_with_retry(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
    )
    .await;
    store.ensure_schema().await.context("creating schema")?;

    let http = reqwest::Client::new();
    let index = ElasticIndex::new(
        http.clone(),
        settings.search.url.clone(),
        settings.search.index.clone(),
    );
    index.wait_until_ready().await;
    index.ensure_index().await.context("creating search index")?;

    // 3. Bring up the node gateway behind one shared request limiter
    let permits = Arc::new(Semaphore::new(settings.node.max_inflight));
    let gateway = NodeGateway::new(
        http.clone(),
        NodeGatewayConfig {
            base_url: settings.node.base_url(),
            username: settings.node.username.clone(),
            password: settings.node.password.clone(),
            timeout: Duration::from_secs(settings.node.timeout_secs),
        },
        permits.clone(),
    );
    if !gateway
        .wait_until_reachable(settings.node.bootstrap_attempts)
        .await
    {
        match settings.node.bootstrap_policy {
            BootstrapPolicy::FailFast => anyhow::bail!(
                "node unreachable after {} attempts",
                settings.node.bootstrap_attempts
            ),
            BootstrapPolicy::ProceedDegraded => {
                tracing::warn!("node unreachable, starting anyway")
            }
        }
    }
    let gateway = Arc::new(gateway);
    if let Ok(info) = gateway.node_config().await {
        tracing::info!(peer = %info.peer_id, "connected to local node");
    }

    // 4. The rate source shares the limiter, so total outbound stays bounded
    let rates = Arc::new(BlockchainRateSource::new(
        http,
        RateSourceConfig {
            base_url: settings.rates.url.clone(),
            timeout: Duration::from_secs(settings.rates.timeout_secs),
        },
        permits,
    ));

    // 5. Assemble the pipeline and hand it to the scheduler
    let store = Arc::new(store);
    let index = Arc::new(index);
    let discovery =
        DiscoveryService::new(gateway.clone(), store.clone(), settings.crawler.seed_sample);
    let catalog = CatalogService::new(index, store.clone());
    let ingest = IngestService::new(
        gateway,
        store,
        catalog,
        rates,
        settings.crawler.fresh_sample,
        settings.crawler.refresh_sample,
    );
    let scheduler = Scheduler::new(
        discovery,
        ingest,
        settings.crawler.min_delay_secs,
        settings.crawler.max_delay_secs,
    );

    tracing::info!("🚀 souk-crawler started");
    scheduler.run().await;
    Ok(())
}
