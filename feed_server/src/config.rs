//! Construction-time parameters of the price core.
//!
//! `FeedConfig` is filled once at startup (from the command line in the server
//! binary, from `Default` in tests) and handed to every component that needs it.
//! Nothing here is reloaded at runtime.

use std::time::Duration;

use feed_common::{FeedError, Result};

use crate::model::hub::DEFAULT_QUEUE_CAPACITY;

/// Default period between two mutator ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);
/// Default lower bound for any price.
pub const DEFAULT_FLOOR_PRICE: f64 = 0.01;
/// Default bound of the per-tick change, as a fraction (`0.02` = 2%).
pub const DEFAULT_MAX_CHANGE: f64 = 0.02;
/// Default silence after which a streaming client is dropped.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Named parameters of the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Period between ticks.
    pub tick_interval: Duration,
    /// Pending updates each subscriber queue can hold.
    pub queue_capacity: usize,
    /// Minimum price after a mutation.
    pub floor_price: f64,
    /// Largest absolute fractional change drawn per tick.
    pub max_change: f64,
    /// Seed for the mutator's generator; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Keep-alive timeout of streaming clients.
    pub ping_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            floor_price: DEFAULT_FLOOR_PRICE,
            max_change: DEFAULT_MAX_CHANGE,
            seed: None,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

impl FeedConfig {
    /// Check the parameters against the price invariants.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(FeedError::Format("tick interval must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(FeedError::Format("queue capacity must be positive".into()));
        }
        if !(self.floor_price.is_finite() && self.floor_price > 0.0) {
            return Err(FeedError::Format(format!(
                "floor price must be positive, got {}",
                self.floor_price
            )));
        }
        if !(0.0..1.0).contains(&self.max_change) {
            return Err(FeedError::Format(format!(
                "max change must be in [0, 1), got {}",
                self.max_change
            )));
        }
        if self.ping_timeout.is_zero() {
            return Err(FeedError::Format("ping timeout must be positive".into()));
        }
        Ok(())
    }
}
