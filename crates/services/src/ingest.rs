//! # Ingest service
//!
//! Pulls a peer's profile and full listing set through the gateway,
//! joins each index summary with its detail record, syncs the batch
//! into both stores, then refreshes satoshi prices listing by listing.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use domains::currency;
use domains::error::StoreError;
use domains::models::{Listing, PeerId};
use domains::ports::{PeerGateway, PeerStore, RateSource};

use crate::catalog::CatalogService;
use crate::sample::sample_peers;

/// What one ingest pass did, for the cycle log line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub candidates: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub listings: usize,
    pub priced: usize,
    pub failures: usize,
}

enum PeerOutcome {
    Ingested { listings: usize, priced: usize },
    Skipped,
    Failed,
}

pub struct IngestService {
    gateway: Arc<dyn PeerGateway>,
    store: Arc<dyn PeerStore>,
    catalog: CatalogService,
    rates: Arc<dyn RateSource>,
    fresh_sample: usize,
    refresh_sample: usize,
}

impl IngestService {
    pub fn new(
        gateway: Arc<dyn PeerGateway>,
        store: Arc<dyn PeerStore>,
        catalog: CatalogService,
        rates: Arc<dyn RateSource>,
        fresh_sample: usize,
        refresh_sample: usize,
    ) -> Self {
        Self {
            gateway,
            store,
            catalog,
            rates,
            fresh_sample,
            refresh_sample,
        }
    }

    /// Ingests a sample of staged peers that have never made it into
    /// the catalog.
    pub async fn fresh_pass(&self) -> IngestStats {
        let staged = match self.store.staged_peers().await {
            Ok(staged) => staged,
            Err(e) => return roster_failure(e),
        };
        let ingested = match self.store.ingested_peers().await {
            Ok(ingested) => ingested,
            Err(e) => return roster_failure(e),
        };

        let seen: HashSet<PeerId> = ingested.into_iter().collect();
        let fresh: Vec<PeerId> = staged.into_iter().filter(|p| !seen.contains(p)).collect();
        self.run_batch(sample_peers(&fresh, self.fresh_sample)).await
    }

    /// Re-ingests a sample of peers already in the catalog, picking up
    /// profile edits, new listings, and price changes.
    pub async fn refresh_pass(&self) -> IngestStats {
        let ingested = match self.store.ingested_peers().await {
            Ok(ingested) => ingested,
            Err(e) => return roster_failure(e),
        };
        self.run_batch(sample_peers(&ingested, self.refresh_sample))
            .await
    }

    async fn run_batch(&self, batch: Vec<PeerId>) -> IngestStats {
        let mut stats = IngestStats {
            candidates: batch.len(),
            ..IngestStats::default()
        };
        let outcomes = join_all(batch.iter().map(|peer| self.ingest_peer(peer))).await;
        for outcome in outcomes {
            match outcome {
                PeerOutcome::Ingested { listings, priced } => {
                    stats.ingested += 1;
                    stats.listings += listings;
                    stats.priced += priced;
                }
                PeerOutcome::Skipped => stats.skipped += 1,
                PeerOutcome::Failed => stats.failures += 1,
            }
        }
        stats
    }

    /// One peer, end to end. An unreachable profile or listing index
    /// skips the peer with zero writes, and so does an empty index: a
    /// peer glitching through its own restart must not wipe its catalog
    /// entries. A listing whose detail fetch fails is dropped alone.
    async fn ingest_peer(&self, peer: &PeerId) -> PeerOutcome {
        let profile = match self.gateway.fetch_profile(peer).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(peer = %peer, error = %e, "profile fetch failed, skipping peer");
                return PeerOutcome::Skipped;
            }
        };
        let summaries = match self.gateway.listing_index(peer).await {
            Ok(summaries) => summaries,
            Err(e) => {
                debug!(peer = %peer, error = %e, "listing index fetch failed, skipping peer");
                return PeerOutcome::Skipped;
            }
        };
        if summaries.is_empty() {
            debug!(peer = %peer, "empty listing index, skipping peer");
            return PeerOutcome::Skipped;
        }

        let details = join_all(
            summaries
                .iter()
                .map(|summary| self.gateway.listing_detail(peer, &summary.hash)),
        )
        .await;
        let mut listings = Vec::with_capacity(summaries.len());
        for (summary, detail) in summaries.into_iter().zip(details) {
            match detail {
                Ok(detail) => listings.push(Listing::from_parts(peer, summary, detail)),
                Err(e) => {
                    debug!(peer = %peer, hash = %summary.hash, error = %e, "detail fetch failed, dropping listing");
                }
            }
        }

        if let Err(e) = self.catalog.upsert_listings(peer, &profile, &listings).await {
            warn!(peer = %peer, error = %e, "catalog sync failed");
            return PeerOutcome::Failed;
        }
        if let Err(e) = self.catalog.upsert_peer(peer, &profile).await {
            warn!(peer = %peer, error = %e, "peer upsert failed");
            return PeerOutcome::Failed;
        }

        let priced = join_all(listings.iter().map(|listing| self.refresh_price(listing)))
            .await
            .into_iter()
            .filter(|priced| *priced)
            .count();
        PeerOutcome::Ingested {
            listings: listings.len(),
            priced,
        }
    }

    /// Recomputes one listing's satoshi price. Unpriced listings and
    /// unknown currencies are left alone.
    async fn refresh_price(&self, listing: &Listing) -> bool {
        if listing.pricing_currency.is_empty() {
            return false;
        }
        let Some(exponent) = currency::exponent(&listing.pricing_currency) else {
            debug!(listing = %listing.id, currency = %listing.pricing_currency, "unknown currency exponent, leaving price alone");
            return false;
        };

        let major = currency::to_major_units(listing.price_amount, exponent);
        let btc = match self.rates.to_btc(&listing.pricing_currency, major).await {
            Ok(btc) => btc,
            Err(e) => {
                debug!(listing = %listing.id, error = %e, "rate fetch failed");
                return false;
            }
        };

        let sats = currency::btc_to_sats(btc);
        match self.catalog.set_listing_price(&listing.id, sats).await {
            Ok(both) => both,
            Err(e) => {
                warn!(listing = %listing.id, error = %e, "price write failed");
                false
            }
        }
    }
}

fn roster_failure(e: StoreError) -> IngestStats {
    warn!(error = %e, "peer roster fetch failed");
    IngestStats {
        failures: 1,
        ..IngestStats::default()
    }
}
