use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::{Credentials, ExchangeMode, ExchangeSettings, PaperSettings, Settings};
use crate::exchange::{BinanceExchange, PaperExchange};
use crate::grid::{Exchange, GridEngine, GridError, StatusReporter};
use crate::server;

/// Runner for the grid bot
pub struct BotRunner {
    settings: Settings,
}

impl BotRunner {
    /// Create a runner from fully merged settings
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run the bot until SIGINT or SIGTERM, then tear the grid down
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        // 1. Setup Logging
        init_logging(&self.settings.log.level);
        info!("Starting BotRunner...");

        // 2. Validate grid values and build the venue
        let grid_config = self.settings.grid.to_grid_config()?;
        let exchange = build_exchange(&self.settings.exchange, &self.settings.paper)?;

        // 3. Build the engine; invalid parameters are fatal
        let engine = Arc::new(GridEngine::new(exchange, grid_config)?);

        // 4. Optional status server
        if self.settings.server.enabled {
            let reporter: Arc<dyn StatusReporter> = engine.clone();
            let host = self.settings.server.host.clone();
            let port = self.settings.server.port;
            tokio::spawn(async move {
                if let Err(e) = server::start_server(reporter, &host, port).await {
                    error!("Status server failed: {}", e);
                }
            });
        }

        // 5. Signals cancel whatever is in flight
        let token = CancellationToken::new();
        let signal_token = token.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            signal_token.cancel();
        });

        // 6. Seed the grid
        match engine.start(&token).await {
            Ok(report) => info!(
                "Grid started at price {:.2}: {} placed, {} failed, {} skipped",
                report.current_price, report.placed, report.failed, report.skipped
            ),
            Err(GridError::Cancelled { completed, remaining }) => warn!(
                "Start interrupted after {} orders ({} not placed)",
                completed, remaining
            ),
            Err(e) => return Err(e.into()),
        }
        info!("{}", engine.status().await);

        token.cancelled().await;

        // 7. Tear down with a fresh token so the sweep itself is not cancelled
        match engine.stop(&CancellationToken::new()).await {
            Ok(report) => info!("Stopped cleanly, {} orders cancelled", report.cancelled),
            Err(GridError::NotRunning) => info!("Grid was not running, nothing to cancel"),
            Err(e) => warn!("Stop finished with errors, reconcile open orders manually: {}", e),
        }

        Ok(())
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env).try_init().ok();
}

/// Build the venue selected by `mode`
fn build_exchange(
    settings: &ExchangeSettings,
    paper: &PaperSettings,
) -> Result<Box<dyn Exchange>, Box<dyn std::error::Error>> {
    let base_url = settings.base_url();
    let timeout = Duration::from_secs(settings.timeout_secs);

    match settings.mode {
        ExchangeMode::Live => {
            let credentials = Credentials::from_env()?;
            info!("Initializing LIVE exchange at {}...", base_url);
            let exchange =
                BinanceExchange::new(credentials.api_key, credentials.api_secret, base_url)?
                    .with_recv_window(settings.recv_window_ms)
                    .with_request_timeout(timeout)?;
            Ok(Box::new(exchange))
        }
        ExchangeMode::Paper => {
            info!("Initializing PAPER exchange with prices from {}...", base_url);
            let prices = BinanceExchange::public(base_url)?.with_request_timeout(timeout)?;
            Ok(Box::new(PaperExchange::new(prices, paper.balances())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
