//! Grid engine - seeds a static price grid and tears it down

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::calculator::grid_levels;
use super::config::GridConfig;
use super::errors::{ConfigError, ExchangeError, GridError, GridResult};
use super::executor::Exchange;
use super::status::{GridStatus, StatusReporter};
use super::types::{EngineState, Order, OrderSide, StartReport, StopReport, TimeInForce};

/// State shared between the lifecycle calls and status readers
#[derive(Debug, Default)]
struct Book {
    state: EngineState,
    /// Venue order id -> order that produced it
    orders: HashMap<String, Order>,
}

/// Single-symbol grid engine
///
/// Owns the configuration, the precomputed levels and the order book.
/// `start` and `stop` are serialized against each other; `status` only
/// touches local state and never waits on the venue.
pub struct GridEngine<E: Exchange> {
    exchange: E,
    config: GridConfig,
    levels: Vec<f64>,
    book: RwLock<Book>,
    lifecycle: Mutex<()>,
}

impl<E: Exchange> GridEngine<E> {
    /// Validate `config`, compute the grid levels and return an idle engine
    pub fn new(exchange: E, config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let levels = grid_levels(config.lower_price, config.upper_price, config.grid_num)?;

        info!(
            "Initialized {} grid levels for {} from {} to {}",
            levels.len(),
            config.symbol,
            config.lower_price,
            config.upper_price
        );

        Ok(Self {
            exchange,
            config,
            levels,
            book: RwLock::new(Book::default()),
            lifecycle: Mutex::new(()),
        })
    }

    /// Seed the grid: one limit order per level around the current price
    ///
    /// Fails only when the engine is already running, the price cannot be
    /// fetched, or `cancel` fires. Individual placement failures are logged
    /// and counted in the returned report. When cancelled during placement
    /// the engine stays running with the orders placed so far, so that
    /// [`stop`](Self::stop) can tear them down.
    pub async fn start(&self, cancel: &CancellationToken) -> GridResult<StartReport> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let mut book = self.book.write().await;
            if book.state.is_running() {
                return Err(GridError::AlreadyRunning);
            }
            book.state = EngineState::Running;
        }
        info!("Starting grid for {}", self.config.symbol);

        let price_fetch = self.exchange.get_symbol_price(&self.config.symbol);
        let current_price = match guarded(cancel, price_fetch).await {
            Some(Ok(price)) if price.is_finite() && price > 0.0 => price,
            Some(Ok(price)) => {
                self.set_idle().await;
                return Err(GridError::PriceFetch(ExchangeError::Parse(format!(
                    "invalid price {price} for {}",
                    self.config.symbol
                ))));
            }
            Some(Err(e)) => {
                self.set_idle().await;
                return Err(GridError::PriceFetch(e));
            }
            None => {
                self.set_idle().await;
                return Err(GridError::Cancelled {
                    completed: 0,
                    remaining: self.levels.len(),
                });
            }
        };
        info!("Current price for {}: {}", self.config.symbol, current_price);

        let orders = self.grid_orders(current_price);
        let mut report = StartReport {
            current_price,
            skipped: self.levels.len() - orders.len(),
            ..Default::default()
        };

        for (idx, order) in orders.iter().enumerate() {
            let price = order.price.unwrap_or_default();
            debug!(
                "Placing {} order at price {} quantity {}",
                order.side, price, order.quantity
            );

            match guarded(cancel, self.exchange.place_order(order)).await {
                Some(Ok(order_id)) => {
                    let replaced = self
                        .book
                        .write()
                        .await
                        .orders
                        .insert(order_id.clone(), order.clone());
                    if replaced.is_some() {
                        warn!("Venue reused order id {}, previous entry replaced", order_id);
                    }
                    report.placed += 1;
                    info!(
                        "Placed {} order {} at price {:.2}, quantity {:.8}",
                        order.side, order_id, price, order.quantity
                    );
                }
                Some(Err(e)) => {
                    warn!("Failed to place order at level {}: {}", price, e);
                    report.failed += 1;
                    report.last_error = Some(e);
                }
                None => {
                    warn!(
                        "Grid seeding cancelled at level {}; placement state there is unknown",
                        price
                    );
                    return Err(GridError::Cancelled {
                        completed: idx,
                        remaining: orders.len() - idx,
                    });
                }
            }
        }

        info!(
            "Placed {}/{} grid orders ({} failed, {} skipped at current price)",
            report.placed,
            orders.len(),
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    /// Cancel every recorded order and return to idle
    ///
    /// The book is cleared and the engine is idle afterwards no matter what.
    /// An error means some orders may still be open on the venue and need
    /// manual reconciliation.
    pub async fn stop(&self, cancel: &CancellationToken) -> GridResult<StopReport> {
        let _lifecycle = self.lifecycle.lock().await;

        let orders = {
            let mut book = self.book.write().await;
            if !book.state.is_running() {
                return Err(GridError::NotRunning);
            }
            book.state = EngineState::Idle;
            std::mem::take(&mut book.orders)
        };

        let mut entries: Vec<(String, Order)> = orders.into_iter().collect();
        entries.sort_by(|a, b| {
            let pa = a.1.price.unwrap_or_default();
            let pb = b.1.price.unwrap_or_default();
            pa.total_cmp(&pb).then_with(|| a.0.cmp(&b.0))
        });
        info!(
            "Stopping grid for {}, cancelling {} orders",
            self.config.symbol,
            entries.len()
        );

        let mut cancelled = 0;
        let mut failures = 0;
        let mut last_error = None;

        for (idx, (order_id, order)) in entries.iter().enumerate() {
            match guarded(cancel, self.exchange.cancel_order(&order.symbol, order_id)).await {
                Some(Ok(())) => {
                    cancelled += 1;
                    info!("Cancelled order {}", order_id);
                }
                Some(Err(e)) => {
                    warn!("Failed to cancel order {}: {}", order_id, e);
                    failures += 1;
                    last_error = Some(e);
                }
                None => {
                    for (left, _) in &entries[idx..] {
                        warn!("Order {} may still be open on the venue", left);
                    }
                    return Err(GridError::Cancelled {
                        completed: idx,
                        remaining: entries.len() - idx,
                    });
                }
            }
        }

        match last_error {
            Some(source) => {
                warn!(
                    "{} of {} cancellations failed; reconcile open orders on the venue",
                    failures,
                    entries.len()
                );
                Err(GridError::CancelFailed { failures, source })
            }
            None => {
                info!("Grid stopped, {} orders cancelled", cancelled);
                Ok(StopReport { cancelled })
            }
        }
    }

    /// Snapshot of the engine for observers
    pub async fn status(&self) -> GridStatus {
        let book = self.book.read().await;
        GridStatus {
            running: book.state.is_running(),
            symbol: self.config.symbol.clone(),
            lower_price: self.config.lower_price,
            upper_price: self.config.upper_price,
            grid_num: self.config.grid_num,
            investment: self.config.investment,
            open_order_count: book.orders.len(),
        }
    }

    pub async fn state(&self) -> EngineState {
        self.book.read().await.state
    }

    /// Copy of the recorded orders
    pub async fn open_orders(&self) -> Vec<(String, Order)> {
        self.book
            .read()
            .await
            .orders
            .iter()
            .map(|(id, order)| (id.clone(), order.clone()))
            .collect()
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Orders for every level except those equal to `current_price`, in level order
    fn grid_orders(&self, current_price: f64) -> Vec<Order> {
        let quote_per_grid = self.config.quote_per_grid();
        self.levels
            .iter()
            .filter_map(|&level| {
                level_order(&self.config.symbol, level, current_price, quote_per_grid)
            })
            .collect()
    }

    async fn set_idle(&self) {
        let mut book = self.book.write().await;
        book.state = EngineState::Idle;
        book.orders.clear();
    }
}

#[async_trait]
impl<E: Exchange> StatusReporter for GridEngine<E> {
    async fn status(&self) -> GridStatus {
        GridEngine::status(self).await
    }
}

/// Build the order resting at `level`
///
/// Buys below the current price, sells above, nothing at it. Quantity
/// converts the per-level quote amount to base currency at the level price.
pub fn level_order(
    symbol: &str,
    level: f64,
    current_price: f64,
    quote_per_grid: f64,
) -> Option<Order> {
    let side = if level < current_price {
        OrderSide::Buy
    } else if level > current_price {
        OrderSide::Sell
    } else {
        return None;
    };

    Some(Order::limit(
        symbol,
        side,
        quote_per_grid / level,
        level,
        TimeInForce::Gtc,
    ))
}

/// Run `fut` unless `cancel` fires first
async fn guarded<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::executor::mock::MockExchange;
    use crate::grid::types::OrderType;
    use std::sync::Arc;

    fn create_test_engine(price: f64) -> (GridEngine<Arc<MockExchange>>, Arc<MockExchange>) {
        // $1000 total investment, 5 levels: 100, 125, 150, 175, 200
        let config = GridConfig::new("BTCUSDT", 100.0, 200.0, 5, 1000.0);
        let exchange = Arc::new(MockExchange::new(price));
        let engine = GridEngine::new(exchange.clone(), config).unwrap();
        (engine, exchange)
    }

    #[test]
    fn test_level_order_sides() {
        let buy = level_order("BTCUSDT", 100.0, 150.0, 100.0).unwrap();
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.order_type, OrderType::Limit);
        assert_eq!(buy.price, Some(100.0));
        assert_eq!(buy.quantity, 1.0);
        assert_eq!(buy.time_in_force, Some(TimeInForce::Gtc));

        let sell = level_order("BTCUSDT", 200.0, 150.0, 100.0).unwrap();
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.quantity, 0.5);

        assert!(level_order("BTCUSDT", 150.0, 150.0, 100.0).is_none());
    }

    #[tokio::test]
    async fn test_new_engine_is_idle() {
        let (engine, _) = create_test_engine(150.0);
        assert_eq!(engine.levels(), &[100.0, 125.0, 150.0, 175.0, 200.0]);
        assert_eq!(engine.state().await, EngineState::Idle);
        assert!(engine.open_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_seeds_grid_around_price() {
        let (engine, exchange) = create_test_engine(150.0);
        let report = engine.start(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.current_price, 150.0);
        assert_eq!(report.placed, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert!(report.last_error.is_none());
        assert_eq!(engine.state().await, EngineState::Running);

        let placed = exchange.placed.lock().await;
        let sides: Vec<_> = placed.iter().map(|(_, o)| (o.price.unwrap(), o.side)).collect();
        assert_eq!(
            sides,
            vec![
                (100.0, OrderSide::Buy),
                (125.0, OrderSide::Buy),
                (175.0, OrderSide::Sell),
                (200.0, OrderSide::Sell),
            ]
        );
        // 1000 / (5 * 2) quote per level
        assert_eq!(placed[0].1.quantity, 100.0 / 100.0);
        assert_eq!(placed[3].1.quantity, 100.0 / 200.0);
        assert_eq!(exchange.price_calls(), 1);
    }

    #[tokio::test]
    async fn test_price_fetch_failure_rolls_back() {
        let (engine, exchange) = create_test_engine(150.0);
        exchange.set_fail_price(true).await;

        let err = engine.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GridError::PriceFetch(_)));
        assert_eq!(engine.state().await, EngineState::Idle);
        assert!(exchange.placed.lock().await.is_empty());

        // Restartable once the venue recovers
        exchange.set_fail_price(false).await;
        assert!(engine.start(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_price_rejected() {
        let (engine, exchange) = create_test_engine(0.0);
        let err = engine.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GridError::PriceFetch(ExchangeError::Parse(_))));
        assert_eq!(engine.state().await, EngineState::Idle);
        assert!(exchange.placed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_cancels_everything() {
        let (engine, exchange) = create_test_engine(150.0);
        let token = CancellationToken::new();
        engine.start(&token).await.unwrap();

        let report = engine.stop(&token).await.unwrap();
        assert_eq!(report.cancelled, 4);
        assert_eq!(exchange.cancel_calls(), 4);
        assert!(exchange.open_orders.lock().await.is_empty());
        assert!(engine.open_orders().await.is_empty());
        assert_eq!(engine.state().await, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_stop_returns_last_cancel_error() {
        let (engine, exchange) = create_test_engine(150.0);
        let token = CancellationToken::new();
        engine.start(&token).await.unwrap();
        exchange.fail_cancellation_of("mock-2").await;

        let err = engine.stop(&token).await.unwrap_err();
        match err {
            GridError::CancelFailed { failures, source } => {
                assert_eq!(failures, 1);
                assert!(matches!(source, ExchangeError::Api { code: -2011, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Every order was attempted and the local book is cleared regardless
        assert_eq!(exchange.cancel_calls(), 4);
        assert_eq!(exchange.open_orders.lock().await.len(), 1);
        assert_eq!(engine.state().await, EngineState::Idle);
        assert_eq!(engine.status().await.open_order_count, 0);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let (engine, _) = create_test_engine(160.0);
        let status = engine.status().await;
        assert!(!status.running);
        assert_eq!(status.symbol, "BTCUSDT");
        assert_eq!(status.open_order_count, 0);

        engine.start(&CancellationToken::new()).await.unwrap();
        let status = StatusReporter::status(&engine).await;
        assert!(status.running);
        // No level equals 160, so all five are placed
        assert_eq!(status.open_order_count, 5);
        assert_eq!(status.grid_num, 5);
        assert_eq!(status.investment, 1000.0);
    }
}
