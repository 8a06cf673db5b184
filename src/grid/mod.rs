//! Grid Trading Module
//!
//! Seeds a static grid of resting limit orders for one symbol and cancels
//! them again on shutdown.
//!
//! # Architecture
//!
//! - [`calculator`] - Evenly spaced price levels and parameter validation
//! - [`config`] - Grid configuration and validation
//! - [`types`] - Order model and engine state
//! - [`errors`] - Grid-specific error types
//! - [`executor`] - Exchange abstraction (mockable for testing)
//! - [`engine`] - Start/stop state machine and the order book
//! - [`status`] - Read-only status snapshots
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use spot_grid_bot::grid::{GridConfig, GridEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! // $1000 total investment, 5 levels between 25000 and 35000
//! let config = GridConfig::new("BTCUSDT", 25_000.0, 35_000.0, 5, 1000.0);
//! let engine = GridEngine::new(exchange, config)?;
//!
//! let token = CancellationToken::new();
//! engine.start(&token).await?;
//! // ...
//! engine.stop(&token).await?;
//! ```
//!
//! # Testing
//!
//! ```rust,ignore
//! use spot_grid_bot::grid::executor::mock::MockExchange;
//!
//! let exchange = MockExchange::new(30_000.0);
//! exchange.fail_placement_at(25_000.0).await;
//! ```

pub mod calculator;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use calculator::{calculate_grid_levels, grid_levels, validate_grid_params, MAX_GRID_COUNT};
pub use self::config::GridConfig;
pub use engine::{level_order, GridEngine};
pub use errors::{
    ConfigError, ExchangeError, ExchangeResult, GridError, GridParamError, GridResult,
};
pub use executor::Exchange;
pub use status::{GridStatus, StatusReporter};
pub use types::{
    EngineState, Order, OrderSide, OrderType, StartReport, StopReport, TimeInForce,
};
