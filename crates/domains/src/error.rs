//! # Error Taxonomy
//!
//! Classified outcomes for every boundary the pipeline crosses. A pass
//! never dies on one of these: the item carrying the error is skipped
//! and reconsidered on a later pass. The only fatal condition lives in
//! the binaries, at startup, before the first pass.

use thiserror::Error;

/// Classified outcome of a node gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The node could not be reached at all (connect, DNS, socket).
    #[error("transport: {0}")]
    Transport(String),

    /// The node did not answer within the deadline.
    #[error("timed out")]
    Timeout,

    /// The node answered with a failure envelope.
    #[error("remote failure: {0}")]
    Application(String),

    /// The body did not decode into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Relational-store failure. Key conflicts never appear here; the
/// adapters absorb them as updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Search-index failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("search backend: {0}")]
    Backend(String),

    #[error("malformed index response: {0}")]
    Malformed(String),
}

/// Rate-lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("timed out")]
    Timeout,

    /// The rate endpoint returned something that is not a number.
    #[error("malformed rate: {0}")]
    Malformed(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type IndexResult<T> = std::result::Result<T, IndexError>;
pub type RateResult<T> = std::result::Result<T, RateError>;
