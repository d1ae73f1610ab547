//! Command-line arguments for the feed server.
use clap::Parser;
use feed_common::Result;
use feed_server::FeedConfig;
use feed_server::config::{
    DEFAULT_FLOOR_PRICE, DEFAULT_MAX_CHANGE, DEFAULT_PING_TIMEOUT, DEFAULT_TICK_INTERVAL,
};
use feed_server::model::hub::DEFAULT_QUEUE_CAPACITY;
use std::time::Duration;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Live price feed server", long_about = None)]
pub struct ServerArgs {
    /// Milliseconds between two price ticks.
    #[clap(long, default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64)]
    pub tick_ms: u64,

    /// Pending updates buffered per subscriber before updates are dropped.
    #[clap(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Lowest price an instrument can fall to.
    #[clap(long, default_value_t = DEFAULT_FLOOR_PRICE)]
    pub floor: f64,

    /// Largest per-tick move, in percent.
    #[clap(long, default_value_t = DEFAULT_MAX_CHANGE * 100.0)]
    pub max_change_pct: f64,

    /// Seed for the price generator (random if omitted).
    #[clap(long)]
    pub seed: Option<u64>,

    /// Seconds without a PING before a stream is closed.
    #[clap(long, default_value_t = DEFAULT_PING_TIMEOUT.as_secs())]
    pub ping_timeout_secs: u64,

    /// File with `SYMBOL PRICE` lines; the built-in instruments are used if omitted.
    #[clap(long)]
    pub instruments: Option<String>,
}

impl ServerArgs {
    /// Build and validate the feed configuration.
    pub fn to_config(&self) -> Result<FeedConfig> {
        let config = FeedConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            queue_capacity: self.queue_capacity,
            floor_price: self.floor,
            max_change: self.max_change_pct / 100.0,
            seed: self.seed,
            ping_timeout: Duration::from_secs(self.ping_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }
}
