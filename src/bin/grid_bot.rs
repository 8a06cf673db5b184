//! Spot Grid Bot Binary
//!
//! Places a static grid of limit orders on Binance spot and cancels them
//! again on Ctrl-C or SIGTERM.
//!
//! ## Setup
//!
//! 1. Create a `.env` file in the project root:
//!    ```
//!    BINANCE_TEST_API_KEY=your-testnet-key
//!    BINANCE_TEST_API_SECRET=your-testnet-secret
//!    ```
//!
//! 2. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- --lower 25000 --upper 35000 --investment 1000
//!    ```
//!
//! Settings can also come from a file (`--config bot.toml`) or from
//! `BOT_`-prefixed environment variables; flags win over both.

use std::path::PathBuf;

use clap::Parser;

use spot_grid_bot::config::ExchangeMode;
use spot_grid_bot::{BotRunner, Settings};

#[derive(Parser, Debug)]
#[command(name = "grid_bot", about = "Static spot grid trading bot")]
struct Args {
    /// Trading symbol [default: BTCUSDT]
    #[arg(long)]
    symbol: Option<String>,

    /// Lower price bound
    #[arg(long)]
    lower: Option<f64>,

    /// Upper price bound
    #[arg(long)]
    upper: Option<f64>,

    /// Number of grid levels [default: 5]
    #[arg(long)]
    grids: Option<usize>,

    /// Total investment in quote currency
    #[arg(long)]
    investment: Option<f64>,

    /// Optional settings file (TOML, JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulate orders locally instead of sending them to the venue
    #[arg(long)]
    paper: bool,
}

impl Args {
    /// Apply command line values on top of file and environment settings
    fn apply(self, settings: &mut Settings) {
        let grid = &mut settings.grid;
        grid.symbol = self.symbol.or(grid.symbol.take());
        grid.lower_price = self.lower.or(grid.lower_price);
        grid.upper_price = self.upper.or(grid.upper_price);
        grid.grid_num = self.grids.or(grid.grid_num);
        grid.investment = self.investment.or(grid.investment);

        if self.paper {
            settings.exchange.mode = ExchangeMode::Paper;
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut settings);

    if let Err(e) = BotRunner::new(settings).run().await {
        eprintln!("Bot execution error: {}", e);
        std::process::exit(1);
    }
}
