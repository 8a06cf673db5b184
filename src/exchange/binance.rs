//! Binance spot REST client implementing the grid [`Exchange`] trait

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::debug;
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use sha2::Sha256;

use crate::grid::errors::{ExchangeError, ExchangeResult};
use crate::grid::executor::Exchange;
use crate::grid::types::Order;

/// Binance spot testnet
pub const TESTNET_API_URL: &str = "https://testnet.binance.vision";
/// Binance spot production
pub const MAINNET_API_URL: &str = "https://api.binance.com";

const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// Binance REST client
///
/// A client built with [`BinanceExchange::public`] can only fetch prices;
/// signed endpoints fail with [`ExchangeError::Auth`].
pub struct BinanceExchange {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderResponse {
    order_id: i64,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl BinanceExchange {
    /// Create an authenticated client
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ExchangeResult<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ExchangeError::Auth("API key and secret are required".into()));
        }

        let mut exchange = Self::public(base_url)?;
        exchange.credentials = Some(Credentials { api_key, api_secret });
        Ok(exchange)
    }

    /// Create a client for public market data only
    pub fn public(base_url: impl Into<String>) -> ExchangeResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        })
    }

    /// Builder: override the HTTP timeout
    pub fn with_request_timeout(self, timeout: Duration) -> ExchangeResult<Self> {
        let mut rebuilt = Self::with_timeout(self.base_url, timeout)?;
        rebuilt.credentials = self.credentials;
        rebuilt.recv_window_ms = self.recv_window_ms;
        Ok(rebuilt)
    }

    /// Builder: set the signed request `recvWindow`
    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credentials(&self) -> ExchangeResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::Auth("signed endpoint requires API credentials".into()))
    }

    async fn public_get(&self, path: &str, params: &[(&str, String)]) -> ExchangeResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, params);
        let response = self.client.get(&url).query(params).send().await?;
        check_status(response).await
    }

    async fn signed(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> ExchangeResult<Response> {
        let credentials = self.credentials()?;

        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));
        let query = encode_query(&params)?;
        let signature = sign(&credentials.api_secret, &query)?;

        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("{} {}{}?{}", method, self.base_url, path, query);

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Map non-success responses to [`ExchangeError`]
async fn check_status(response: Response) -> ExchangeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(parse_error_body(status.as_u16(), &body))
}

fn parse_error_body(status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => ExchangeError::Api {
            code: err.code,
            msg: err.msg,
        },
        Err(_) => ExchangeError::Http(format!("HTTP {status}: {body}")),
    }
}

/// HMAC-SHA256 of `payload`, hex encoded
pub fn sign(secret: &str, payload: &str) -> ExchangeResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(format!("invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Url-encoded query string; this exact string is what gets signed
fn encode_query(params: &[(&str, String)]) -> ExchangeResult<String> {
    serde_urlencoded::to_string(params)
        .map_err(|e| ExchangeError::Rejected(format!("failed to encode request: {e}")))
}

/// Request parameters for a new order
fn order_params(order: &Order) -> ExchangeResult<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("symbol", order.symbol.clone()),
        ("side", order.side.as_str().to_string()),
        ("type", order.order_type.as_str().to_string()),
        ("quantity", format!("{:.8}", order.quantity)),
    ];

    if order.is_limit() {
        let price = order
            .price
            .ok_or_else(|| ExchangeError::Rejected("limit order without price".into()))?;
        let tif = order
            .time_in_force
            .ok_or_else(|| ExchangeError::Rejected("limit order without time in force".into()))?;
        params.push(("timeInForce", tif.as_str().to_string()));
        params.push(("price", format!("{price:.8}")));
    }

    Ok(params)
}

fn parse_f64(field: &str, value: &str) -> ExchangeResult<f64> {
    value
        .parse::<f64>()
        .map_err(|e| ExchangeError::Parse(format!("invalid {field} '{value}': {e}")))
}

#[async_trait]
impl Exchange for BinanceExchange {
    async fn get_symbol_price(&self, symbol: &str) -> ExchangeResult<f64> {
        let response = self
            .public_get("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        let ticker: TickerPrice = response.json().await?;
        parse_f64("price", &ticker.price)
    }

    async fn place_order(&self, order: &Order) -> ExchangeResult<String> {
        let params = order_params(order)?;
        let response = self.signed(Method::POST, "/api/v3/order", params).await?;
        let ack: NewOrderResponse = response.json().await?;
        Ok(ack.order_id.to_string())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let order_id: i64 = order_id
            .parse()
            .map_err(|e| {
                ExchangeError::Rejected(format!("invalid order ID format '{order_id}': {e}"))
            })?;

        self.signed(
            Method::DELETE,
            "/api/v3/order",
            vec![("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn get_balance(&self, asset: &str) -> ExchangeResult<f64> {
        let response = self.signed(Method::GET, "/api/v3/account", Vec::new()).await?;
        let account: AccountInfo = response.json().await?;
        free_balance(&account, asset)
    }
}

fn free_balance(account: &AccountInfo, asset: &str) -> ExchangeResult<f64> {
    match account.balances.iter().find(|b| b.asset == asset) {
        Some(balance) => parse_f64("balance", &balance.free),
        None => Err(ExchangeError::NotFound(format!("asset {asset}"))),
    }
}
