//! Exchange abstraction for grid trading - enables mocking for tests

use async_trait::async_trait;

use super::errors::ExchangeResult;
use super::types::Order;

/// Venue operations used by the grid engine - can be mocked for testing
///
/// Implementations map venue identifiers and failures into these types; the
/// engine knows nothing about transport, authentication or wire formats.
/// Retry policy, if any, belongs in the implementation.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Get the latest traded price for a symbol
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64>;

    /// Place an order, returning the venue-assigned order id
    async fn place_order(&self, order: &Order) -> ExchangeResult<String>;

    /// Cancel an order by venue id
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()>;

    /// Get the free balance of an asset
    async fn get_balance(&self, asset: &str) -> ExchangeResult<f64>;
}

#[async_trait]
impl<E: Exchange + ?Sized> Exchange for std::sync::Arc<E> {
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        (**self).get_symbol_price(symbol).await
    }

    async fn place_order(&self, order: &Order) -> ExchangeResult<String> {
        (**self).place_order(order).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        (**self).cancel_order(symbol, order_id).await
    }

    async fn get_balance(&self, asset: &str) -> ExchangeResult<f64> {
        (**self).get_balance(asset).await
    }
}

#[async_trait]
impl<E: Exchange + ?Sized> Exchange for Box<E> {
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        (**self).get_symbol_price(symbol).await
    }

    async fn place_order(&self, order: &Order) -> ExchangeResult<String> {
        (**self).place_order(order).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        (**self).cancel_order(symbol, order_id).await
    }

    async fn get_balance(&self, asset: &str) -> ExchangeResult<f64> {
        (**self).get_balance(asset).await
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock exchange for testing grid bots without a real exchange connection.
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use crate::grid::errors::ExchangeError;

    /// Deterministic in-memory exchange
    ///
    /// Order ids are `mock-1`, `mock-2`, ... in placement order. Failures can
    /// be injected per call site, and an artificial latency makes every call
    /// suspend so cancellation paths can be exercised.
    pub struct MockExchange {
        pub price: Arc<Mutex<f64>>,
        /// Every acknowledged placement, in order
        pub placed: Arc<Mutex<Vec<(String, Order)>>>,
        /// Orders placed and not yet cancelled
        pub open_orders: Arc<Mutex<HashMap<String, Order>>>,
        /// Every successful cancellation, in order
        pub cancelled: Arc<Mutex<Vec<String>>>,
        pub balances: Arc<Mutex<HashMap<String, f64>>>,
        pub fail_price: Arc<Mutex<bool>>,
        /// Placements at these prices are rejected
        pub fail_place_prices: Arc<Mutex<Vec<f64>>>,
        /// Cancellations of these ids are rejected
        pub fail_cancel_ids: Arc<Mutex<HashSet<String>>>,
        pub latency: Arc<Mutex<Option<Duration>>>,
        price_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
        next_oid: AtomicU64,
    }

    impl MockExchange {
        pub fn new(price: f64) -> Self {
            Self {
                price: Arc::new(Mutex::new(price)),
                placed: Arc::new(Mutex::new(Vec::new())),
                open_orders: Arc::new(Mutex::new(HashMap::new())),
                cancelled: Arc::new(Mutex::new(Vec::new())),
                balances: Arc::new(Mutex::new(HashMap::new())),
                fail_price: Arc::new(Mutex::new(false)),
                fail_place_prices: Arc::new(Mutex::new(Vec::new())),
                fail_cancel_ids: Arc::new(Mutex::new(HashSet::new())),
                latency: Arc::new(Mutex::new(None)),
                price_calls: AtomicUsize::new(0),
                cancel_calls: AtomicUsize::new(0),
                next_oid: AtomicU64::new(1),
            }
        }

        pub async fn set_price(&self, price: f64) {
            *self.price.lock().await = price;
        }

        pub async fn set_fail_price(&self, fail: bool) {
            *self.fail_price.lock().await = fail;
        }

        pub async fn fail_placement_at(&self, price: f64) {
            self.fail_place_prices.lock().await.push(price);
        }

        pub async fn fail_cancellation_of(&self, order_id: impl Into<String>) {
            self.fail_cancel_ids.lock().await.insert(order_id.into());
        }

        pub async fn set_latency(&self, latency: Duration) {
            *self.latency.lock().await = Some(latency);
        }

        pub async fn set_balance(&self, asset: impl Into<String>, amount: f64) {
            self.balances.lock().await.insert(asset.into(), amount);
        }

        /// Number of `get_symbol_price` calls served
        pub fn price_calls(&self) -> usize {
            self.price_calls.load(Ordering::SeqCst)
        }

        /// Number of `cancel_order` calls received, successful or not
        pub fn cancel_calls(&self) -> usize {
            self.cancel_calls.load(Ordering::SeqCst)
        }

        async fn delay(&self) {
            let latency = *self.latency.lock().await;
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl Exchange for MockExchange {
        async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
            self.delay().await;
            self.price_calls.fetch_add(1, Ordering::SeqCst);

            if *self.fail_price.lock().await {
                return Err(ExchangeError::Http(format!("mock price failure for {symbol}")));
            }
            Ok(*self.price.lock().await)
        }

        async fn place_order(&self, order: &Order) -> ExchangeResult<String> {
            self.delay().await;

            let price = order.price.unwrap_or_default();
            if self.fail_place_prices.lock().await.contains(&price) {
                return Err(ExchangeError::Rejected(format!("mock rejection at {price}")));
            }

            let oid = format!("mock-{}", self.next_oid.fetch_add(1, Ordering::SeqCst));
            self.placed.lock().await.push((oid.clone(), order.clone()));
            self.open_orders.lock().await.insert(oid.clone(), order.clone());
            Ok(oid)
        }

        async fn cancel_order(&self, _symbol: &str, order_id: &str) -> ExchangeResult<()> {
            self.delay().await;
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_cancel_ids.lock().await.contains(order_id) {
                return Err(ExchangeError::Api {
                    code: -2011,
                    msg: format!("mock cancel rejected for {order_id}"),
                });
            }

            if self.open_orders.lock().await.remove(order_id).is_none() {
                return Err(ExchangeError::NotFound(format!("order {order_id}")));
            }
            self.cancelled.lock().await.push(order_id.to_string());
            Ok(())
        }

        async fn get_balance(&self, asset: &str) -> ExchangeResult<f64> {
            self.delay().await;
            self.balances
                .lock()
                .await
                .get(asset)
                .copied()
                .ok_or_else(|| ExchangeError::NotFound(format!("asset {asset}")))
        }
    }

}
