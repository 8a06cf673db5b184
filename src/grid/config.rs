//! Grid trading configuration

use serde::{Deserialize, Serialize};

use super::calculator::validate_grid_params;
use super::errors::ConfigError;

/// Grid bot configuration
///
/// Built once by the caller and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Trading pair symbol (e.g., "BTCUSDT")
    pub symbol: String,

    /// Lower price boundary of the grid
    pub lower_price: f64,

    /// Upper price boundary of the grid
    pub upper_price: f64,

    /// Number of price levels, bounds included
    pub grid_num: usize,

    /// Total investment in quote currency
    pub investment: f64,
}

impl GridConfig {
    /// Create a new grid configuration
    ///
    /// # Arguments
    /// * `symbol` - Trading pair (e.g., "BTCUSDT")
    /// * `lower_price` - Lower price boundary for the grid
    /// * `upper_price` - Upper price boundary for the grid
    /// * `grid_num` - Number of grid levels (2 to `MAX_GRID_COUNT`)
    /// * `investment` - Total quote amount to invest in the grid
    pub fn new(
        symbol: impl Into<String>,
        lower_price: f64,
        upper_price: f64,
        grid_num: usize,
        investment: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            lower_price,
            upper_price,
            grid_num,
            investment,
        }
    }

    /// Validate the configuration, reporting the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        if self.investment.is_nan() || self.investment <= 0.0 {
            return Err(ConfigError::NonPositiveInvestment(self.investment));
        }

        validate_grid_params(self.lower_price, self.upper_price, self.grid_num)?;
        Ok(())
    }

    /// Quote amount allotted to each level
    ///
    /// The investment is halved across the buy and sell sides of the grid
    /// regardless of where the current price sits in the range.
    pub fn quote_per_grid(&self) -> f64 {
        self.investment / (self.grid_num as f64 * 2.0)
    }
}
