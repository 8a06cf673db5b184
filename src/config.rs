use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::exchange::{MAINNET_API_URL, TESTNET_API_URL};
use crate::grid::GridConfig;

/// Environment variable holding the venue API key
pub const API_KEY_ENV: &str = "BINANCE_TEST_API_KEY";
/// Environment variable holding the venue API secret
pub const API_SECRET_ENV: &str = "BINANCE_TEST_API_SECRET";

/// Errors raised while assembling runtime settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("lower price, upper price, and investment amount are required")]
    MissingGridValues,

    #[error("BINANCE_TEST_API_KEY and BINANCE_TEST_API_SECRET environment variables are required")]
    MissingCredentials,
}

/// Main configuration struct
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Grid parameters; usually supplied on the command line
    #[serde(default)]
    pub grid: GridSettings,
    /// Venue selection and client tuning
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Simulated balances for paper mode
    #[serde(default)]
    pub paper: PaperSettings,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Status server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct GridSettings {
    /// Trading pair, defaults to BTCUSDT
    pub symbol: Option<String>,
    pub lower_price: Option<f64>,
    pub upper_price: Option<f64>,
    /// Number of levels, defaults to 5
    pub grid_num: Option<usize>,
    /// Total investment in quote currency
    pub investment: Option<f64>,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_grid_num() -> usize {
    5
}

impl GridSettings {
    /// Build the engine configuration
    ///
    /// Only presence is checked here; range validation is left to the engine.
    pub fn to_grid_config(&self) -> Result<GridConfig, SettingsError> {
        let required = |v: Option<f64>| {
            v.filter(|x| *x != 0.0)
                .ok_or(SettingsError::MissingGridValues)
        };

        Ok(GridConfig::new(
            self.symbol.clone().unwrap_or_else(default_symbol),
            required(self.lower_price)?,
            required(self.upper_price)?,
            self.grid_num.unwrap_or_else(default_grid_num),
            required(self.investment)?,
        ))
    }
}

/// Live trading or local simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    #[default]
    Live,
    Paper,
}

/// Which venue deployment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeSettings {
    /// Mode: "live" or "paper"
    #[serde(default)]
    pub mode: ExchangeMode,
    /// Environment: "testnet" or "mainnet"
    #[serde(default)]
    pub env: Network,
    /// Overrides the URL implied by `env`
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            mode: ExchangeMode::default(),
            env: Network::default(),
            base_url: None,
            recv_window_ms: default_recv_window_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ExchangeSettings {
    pub fn base_url(&self) -> String {
        match (&self.base_url, self.env) {
            (Some(url), _) => url.clone(),
            (None, Network::Testnet) => TESTNET_API_URL.to_string(),
            (None, Network::Mainnet) => MAINNET_API_URL.to_string(),
        }
    }
}

fn default_recv_window_ms() -> u64 {
    5_000
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Default, Deserialize)]
pub struct PaperSettings {
    /// Free balance per asset, e.g. { USDT = 10000.0 }
    #[serde(default)]
    pub balances: HashMap<String, f64>,
}

impl PaperSettings {
    /// Balances keyed by upper-case asset name
    pub fn balances(&self) -> HashMap<String, f64> {
        self.balances
            .iter()
            .map(|(asset, amount)| (asset.to_uppercase(), *amount))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Enable the local status server
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// Server port (default 3000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Server host (default 127.0.0.1)
    #[serde(default = "default_server_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            port: default_server_port(),
            host: default_server_host(),
        }
    }
}

fn default_server_enabled() -> bool {
    false
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

impl Settings {
    /// Load settings from an optional configuration file
    ///
    /// Environment variables override the file, e.g.
    /// `BOT_GRID__SYMBOL=ETHUSDT` or `BOT_EXCHANGE__MODE=paper`.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        let s = builder
            .add_source(
                Environment::with_prefix("BOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(s.try_deserialize()?)
    }
}

/// Venue API credentials
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; empty values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let api_key = lookup(API_KEY_ENV).filter(|v| !v.is_empty());
        let api_secret = lookup(API_SECRET_ENV).filter(|v| !v.is_empty());

        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Ok(Self { api_key, api_secret }),
            _ => Err(SettingsError::MissingCredentials),
        }
    }
}
