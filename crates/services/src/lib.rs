//! souk-search/crates/services/src/lib.rs
//!
//! Engines of the crawl pipeline. Each service is plain logic over the
//! domain ports; binaries assemble them with real adapters, tests with
//! mocks.

pub mod catalog;
pub mod discovery;
pub mod ingest;
pub mod sample;
pub mod scheduler;

pub use catalog::{CatalogError, CatalogResult, CatalogService};
pub use discovery::{DiscoveryService, DiscoveryStats};
pub use ingest::{IngestService, IngestStats};
pub use scheduler::Scheduler;
