//! Grid level calculation - evenly spaced prices between two bounds

use super::errors::GridParamError;

/// Largest accepted number of grid levels
pub const MAX_GRID_COUNT: usize = 10_000;

/// Validate the raw parameters of an arithmetic grid
///
/// Prices must be finite and strictly positive, `lower` must be below
/// `upper`, and the level count must lie in `2..=MAX_GRID_COUNT`.
pub fn validate_grid_params(
    lower: f64,
    upper: f64,
    grid_num: usize,
) -> Result<(), GridParamError> {
    let valid_price = |p: f64| p.is_finite() && p > 0.0;
    if !valid_price(lower) || !valid_price(upper) {
        return Err(GridParamError::InvalidPrice { lower, upper });
    }

    if lower >= upper {
        return Err(GridParamError::InvalidRange { lower, upper });
    }

    if !(2..=MAX_GRID_COUNT).contains(&grid_num) {
        return Err(GridParamError::InvalidGridCount(grid_num));
    }

    Ok(())
}

/// Calculate `grid_num` evenly spaced price levels from `lower` to `upper` inclusive
///
/// Returns `None` when the parameters fail [`validate_grid_params`] or the
/// range is too narrow to hold `grid_num` distinct prices. No tick
/// size rounding is applied here; that is the venue client's concern.
pub fn calculate_grid_levels(lower: f64, upper: f64, grid_num: usize) -> Option<Vec<f64>> {
    grid_levels(lower, upper, grid_num).ok()
}

/// Same as [`calculate_grid_levels`] but reports which parameter is invalid
pub fn grid_levels(lower: f64, upper: f64, grid_num: usize) -> Result<Vec<f64>, GridParamError> {
    validate_grid_params(lower, upper, grid_num)?;

    let interval = (upper - lower) / (grid_num - 1) as f64;
    let mut levels: Vec<f64> = (0..grid_num).map(|i| lower + i as f64 * interval).collect();

    // Accumulated rounding must not move the upper endpoint.
    levels[grid_num - 1] = upper;

    if !levels.windows(2).all(|w| w[0] < w[1]) {
        return Err(GridParamError::LevelsNotDistinct {
            lower,
            upper,
            grid_num,
        });
    }

    Ok(levels)
}
