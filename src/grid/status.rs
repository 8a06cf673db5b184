//! Read-only status snapshots for external observers

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a grid engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStatus {
    pub running: bool,
    pub symbol: String,
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_num: usize,
    pub investment: f64,
    #[serde(rename = "openOrders")]
    pub open_order_count: usize,
}

impl fmt::Display for GridStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] range {:.2}-{:.2}, {} grids, investment {:.2}, {} open orders",
            self.symbol,
            if self.running { "running" } else { "idle" },
            self.lower_price,
            self.upper_price,
            self.grid_num,
            self.investment,
            self.open_order_count
        )
    }
}

/// Source of status snapshots
///
/// Implementations must answer from local state only and never wait on
/// network I/O.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn status(&self) -> GridStatus;
}
