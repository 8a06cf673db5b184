//! Paper Trading Exchange
//!
//! Reads live prices from a real venue but keeps orders and balances in
//! memory. Orders never fill; they rest until cancelled.

use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::grid::errors::{ExchangeError, ExchangeResult};
use crate::grid::executor::Exchange;
use crate::grid::types::Order;

/// Simulated exchange backed by a real price source
pub struct PaperExchange<P: Exchange> {
    price_source: P,
    orders: Mutex<HashMap<String, Order>>,
    balances: HashMap<String, f64>,
}

impl<P: Exchange> PaperExchange<P> {
    /// Create a paper exchange
    ///
    /// # Arguments
    /// * `price_source` - Venue used for `get_symbol_price` only
    /// * `balances` - Simulated free balances by asset
    pub fn new(price_source: P, balances: HashMap<String, f64>) -> Self {
        Self {
            price_source,
            orders: Mutex::new(HashMap::new()),
            balances,
        }
    }

    /// Orders currently resting in the simulation
    pub async fn open_orders(&self) -> HashMap<String, Order> {
        self.orders.lock().await.clone()
    }
}

#[async_trait]
impl<P: Exchange> Exchange for PaperExchange<P> {
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        self.price_source.get_symbol_price(symbol).await
    }

    async fn place_order(&self, order: &Order) -> ExchangeResult<String> {
        if order.quantity.is_nan() || order.quantity <= 0.0 {
            return Err(ExchangeError::Rejected(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }
        if order.is_limit() && (order.price.is_none() || order.time_in_force.is_none()) {
            return Err(ExchangeError::Rejected(
                "limit order requires price and time in force".into(),
            ));
        }

        let order_id = Uuid::new_v4().to_string();
        info!(
            "[PAPER] Accepted {} {} {} @ {:?} -> {}",
            order.side, order.quantity, order.symbol, order.price, order_id
        );
        self.orders.lock().await.insert(order_id.clone(), order.clone());
        Ok(order_id)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let mut orders = self.orders.lock().await;
        match orders.get(order_id) {
            Some(order) if order.symbol == symbol => {
                orders.remove(order_id);
                info!("[PAPER] Cancelled {}", order_id);
                Ok(())
            }
            _ => Err(ExchangeError::NotFound(format!("order {order_id} for {symbol}"))),
        }
    }

    async fn get_balance(&self, asset: &str) -> ExchangeResult<f64> {
        self.balances
            .get(asset)
            .copied()
            .ok_or_else(|| ExchangeError::NotFound(format!("asset {asset}")))
    }
}
