//! Error handling for Quotefolio
//!
//! Defines the typed failures of a refresh pass and establishes a unified
//! Result type using anyhow for context chaining at the application edge.

use thiserror::Error;

/// Why a single symbol could not be quoted.
///
/// Always recovered locally: the holding is skipped for the pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("http error: {0}")]
    Http(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{provider}: {message}")]
    Provider { provider: String, message: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Http(err.to_string()),
        }
    }
}

/// Core error types for portfolio operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    #[error("quote fetch failed for {symbol}: {source}")]
    SymbolFetchFailure {
        symbol: String,
        #[source]
        source: FetchError,
    },

    #[error("all {attempted} quote fetches failed (last: {last})")]
    TotalFetchFailure { attempted: usize, last: FetchError },

    #[error("aggregation produced no valued holdings out of {expected}")]
    DegenerateAggregationFailure { expected: usize },

    #[error("aggregation overflowed summing {0}")]
    AggregationOverflow(String),

    #[error("malformed holding {symbol}: {reason}")]
    MalformedHoldingFailure { symbol: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("scheduler has been shut down")]
    ShutDown,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PortfolioError {
    fn from(err: std::io::Error) -> Self {
        PortfolioError::Io(err.to_string())
    }
}

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;
