//! # gateway-adapters
//!
//! Outbound HTTP adapters: the local Souk node gateway and the public
//! BTC rate source. Both hold the same semaphore, so total outbound
//! concurrency stays bounded no matter which engine is calling.

pub mod node;
pub mod rates;

pub use node::{NodeGateway, NodeGatewayConfig};
pub use rates::{BlockchainRateSource, RateSourceConfig};
