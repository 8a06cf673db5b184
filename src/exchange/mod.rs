//! Venue clients implementing [`Exchange`](crate::grid::Exchange)
//!
//! - [`binance`] - Binance spot REST API (testnet by default)
//! - [`paper`] - in-memory simulation with live prices

pub mod binance;
pub mod paper;

pub use binance::{BinanceExchange, MAINNET_API_URL, TESTNET_API_URL};
pub use paper::PaperExchange;
