#![deny(unreachable_pub)]
pub mod config;
pub mod exchange;
pub mod grid;
pub mod runner;
pub mod server;

pub use crate::config::Settings;
pub use grid::{GridConfig, GridEngine, GridError, GridStatus};
pub use runner::BotRunner;
