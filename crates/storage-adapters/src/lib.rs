//! souk-search/crates/storage-adapters/src/lib.rs
//!
//! Persistence adapters behind the `PeerStore` and `ListingIndex`
//! ports. Backends are feature-gated so a binary links only the stores
//! it runs against.

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "search-elastic")]
pub mod elastic;

#[cfg(feature = "db-postgres")]
pub use postgres::PgPeerStore;

#[cfg(feature = "search-elastic")]
pub use elastic::ElasticIndex;
