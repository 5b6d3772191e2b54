//! # Postgres peer store
//!
//! Relational half of the dual store: staged peers, ingested peers with
//! their raw profiles, listings with their raw documents, and abuse
//! reports. All queries are runtime-checked; the schema is created on
//! startup if missing.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::warn;

use domains::error::{StoreError, StoreResult};
use domains::models::{Listing, ListingId, PeerId, PeerProfile, Report};
use domains::ports::PeerStore;

pub struct PgPeerStore {
    pool: PgPool,
}

fn store_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl PgPeerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with unbounded retry. The crawler is useless without its
    /// store, so startup blocks until Postgres answers, sleeping a
    /// uniform 1-5s between attempts.
    pub async fn connect_with_retry(url: &str, max_connections: u32) -> Self {
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => return Self { pool },
                Err(e) => warn!(error = %e, "postgres not ready, retrying"),
            }
            let pause = rand::rng().random_range(1_000..=5_000);
            tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
        }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS staged_peers (
                peer_id TEXT PRIMARY KEY
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS peers (
                peer_id             TEXT PRIMARY KEY,
                last_profile_update TIMESTAMPTZ,
                last_listing_update TIMESTAMPTZ,
                last_online         TIMESTAMPTZ,
                listing_count       BIGINT,
                profile             JSONB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS listings (
                listing_id           TEXT PRIMARY KEY,
                peer_id              TEXT NOT NULL,
                equivalent_btc_price BIGINT,
                last_price_update    TIMESTAMPTZ,
                currently_featured   BOOLEAN,
                summary              JSONB,
                detail               JSONB,
                display              JSONB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reports (
                peer_id      TEXT NOT NULL,
                slug         TEXT NOT NULL,
                reason       TEXT NOT NULL,
                submitted_at TIMESTAMPTZ NOT NULL,
                status       BOOLEAN,
                PRIMARY KEY (peer_id, slug, submitted_at)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }
}

#[async_trait]
impl PeerStore for PgPeerStore {
    async fn stage_peers(&self, peers: &[PeerId]) -> StoreResult<u64> {
        if peers.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = peers.iter().map(|p| p.as_str().to_owned()).collect();
        let result = sqlx::query(
            "INSERT INTO staged_peers (peer_id)
             SELECT DISTINCT unnest($1::text[])
             ON CONFLICT (peer_id) DO NOTHING",
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn is_staged(&self, peer: &PeerId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM staged_peers WHERE peer_id = $1")
            .bind(peer.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.is_some())
    }

    async fn staged_peers(&self) -> StoreResult<Vec<PeerId>> {
        let rows = sqlx::query("SELECT peer_id FROM staged_peers")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| PeerId::new(row.get::<String, _>("peer_id")))
            .collect())
    }

    async fn ingested_peers(&self) -> StoreResult<Vec<PeerId>> {
        let rows = sqlx::query("SELECT peer_id FROM peers")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| PeerId::new(row.get::<String, _>("peer_id")))
            .collect())
    }

    async fn upsert_peer(&self, peer: &PeerId, profile: &PeerProfile) -> StoreResult<()> {
        let profile_json =
            serde_json::to_value(profile).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO peers (peer_id, last_profile_update, profile)
             VALUES ($1, $2, $3)
             ON CONFLICT (peer_id) DO UPDATE
             SET last_profile_update = EXCLUDED.last_profile_update,
                 profile             = EXCLUDED.profile",
        )
        .bind(peer.as_str())
        .bind(Utc::now())
        .bind(profile_json)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Replaces the stored documents for each listing, then rolls the
    /// listing count and update time into the peer row. A re-ingested
    /// listing keeps its satoshi price until the next rate refresh.
    async fn upsert_listings(&self, peer: &PeerId, listings: &[Listing]) -> StoreResult<()> {
        for listing in listings {
            let display =
                serde_json::to_value(&listing.display).map_err(|e| StoreError::Backend(e.to_string()))?;
            sqlx::query(
                "INSERT INTO listings (listing_id, peer_id, summary, detail, display)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (listing_id) DO UPDATE
                 SET summary = EXCLUDED.summary,
                     detail  = EXCLUDED.detail,
                     display = EXCLUDED.display",
            )
            .bind(listing.id.as_str())
            .bind(peer.as_str())
            .bind(&listing.summary)
            .bind(&listing.detail)
            .bind(&display)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        }

        sqlx::query(
            "INSERT INTO peers (peer_id, last_listing_update, listing_count)
             VALUES ($1, $2, $3)
             ON CONFLICT (peer_id) DO UPDATE
             SET last_listing_update = EXCLUDED.last_listing_update,
                 listing_count       = EXCLUDED.listing_count",
        )
        .bind(peer.as_str())
        .bind(Utc::now())
        .bind(listings.len() as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn set_listing_price(&self, listing: &ListingId, sats: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE listings
             SET equivalent_btc_price = $1, last_price_update = $2
             WHERE listing_id = $3",
        )
        .bind(sats)
        .bind(Utc::now())
        .bind(listing.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Duplicate submissions are accepted silently. `status` stays NULL
    /// until a moderator rules on the report.
    async fn insert_report(&self, report: &Report) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO reports (peer_id, slug, reason, submitted_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING",
        )
        .bind(report.peer_id.as_str())
        .bind(&report.slug)
        .bind(&report.reason)
        .bind(report.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn count_peers(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM peers")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.get::<i64, _>("n"))
    }

    async fn count_listings(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM listings")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.get::<i64, _>("n"))
    }
}
