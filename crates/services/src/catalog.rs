//! # Catalog service
//!
//! Writer for the dual store. The search index is written before the
//! relational store, so a half-failed sync leaves the relational side
//! stale rather than the index serving rows nobody can search.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use domains::error::{IndexError, StoreError};
use domains::models::{Listing, ListingId, PeerId, PeerProfile};
use domains::ports::{ListingIndex, PeerStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub struct CatalogService {
    index: Arc<dyn ListingIndex>,
    store: Arc<dyn PeerStore>,
}

impl CatalogService {
    pub fn new(index: Arc<dyn ListingIndex>, store: Arc<dyn PeerStore>) -> Self {
        Self { index, store }
    }

    /// Syncs a peer's listing batch into both stores, index first.
    pub async fn upsert_listings(
        &self,
        peer: &PeerId,
        profile: &PeerProfile,
        listings: &[Listing],
    ) -> CatalogResult<()> {
        self.index.index_listings(peer, profile, listings).await?;
        self.store.upsert_listings(peer, listings).await?;
        Ok(())
    }

    /// Profiles live only in the relational store; the index carries its
    /// peer snapshot inside each listing document.
    pub async fn upsert_peer(&self, peer: &PeerId, profile: &PeerProfile) -> CatalogResult<()> {
        self.store.upsert_peer(peer, profile).await?;
        Ok(())
    }

    /// Pushes a refreshed satoshi price to both stores. Returns whether
    /// both still carried the listing.
    pub async fn set_listing_price(&self, listing: &ListingId, sats: i64) -> CatalogResult<bool> {
        let indexed = self.index.update_price(listing, sats).await?;
        let stored = self.store.set_listing_price(listing, sats).await?;
        if !indexed || !stored {
            debug!(listing = %listing, indexed, stored, "price update missed a store");
        }
        Ok(indexed && stored)
    }
}
