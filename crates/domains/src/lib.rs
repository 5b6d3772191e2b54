//! souk-search/crates/domains/src/lib.rs
//!
//! Core entities, port contracts, and error taxonomy for the Souk
//! crawl and search pipeline.

pub mod currency;
pub mod error;
pub mod models;
pub mod ports;
pub mod search;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
pub use search::*;
