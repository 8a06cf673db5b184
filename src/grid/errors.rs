//! Grid-specific error types

use thiserror::Error;

/// Violations found when validating raw grid parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridParamError {
    #[error("prices must be positive: lower={lower}, upper={upper}")]
    InvalidPrice { lower: f64, upper: f64 },

    #[error("upper price must be greater than lower price: lower={lower}, upper={upper}")]
    InvalidRange { lower: f64, upper: f64 },

    #[error("grid number must be between 2 and 10000, got {0}")]
    InvalidGridCount(usize),

    #[error("range {lower}..{upper} is too narrow for {grid_num} distinct levels")]
    LevelsNotDistinct {
        lower: f64,
        upper: f64,
        grid_num: usize,
    },
}

/// Invalid engine configuration, reported at construction time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("symbol is required")]
    EmptySymbol,

    #[error("investment must be positive, got {0}")]
    NonPositiveInvestment(f64),

    #[error("invalid grid parameters: {0}")]
    InvalidGrid(#[from] GridParamError),
}

/// Failures returned by an [`Exchange`](super::executor::Exchange) implementation
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

/// Result type for exchange calls
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Errors surfaced by the grid engine
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid grid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("grid engine is already running")]
    AlreadyRunning,

    #[error("grid engine is not running")]
    NotRunning,

    #[error("failed to get current price: {0}")]
    PriceFetch(#[source] ExchangeError),

    /// Some cancellations failed; the matching orders may still rest on the venue
    #[error("{failures} order cancellation(s) failed, last error: {source}")]
    CancelFailed {
        failures: usize,
        #[source]
        source: ExchangeError,
    },

    #[error("operation cancelled: {completed} order(s) processed, {remaining} left")]
    Cancelled { completed: usize, remaining: usize },
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;
