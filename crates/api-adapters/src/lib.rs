//! souk-search/crates/api-adapters/src/lib.rs
//!
//! Inbound HTTP surface of the search service. The web framework is
//! feature-gated so the crawler binary never links it.

#[cfg(feature = "web-axum")]
pub mod handlers;

pub mod metrics;

#[cfg(feature = "web-axum")]
pub use handlers::{router, ApiError, ApiState, ProviderInfo};

pub use metrics::Metrics;
