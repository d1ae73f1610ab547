//! Price mutator: the timer-driven producer of every price change.
//!
//! Once per tick the mutator walks the registry and, for each instrument, draws a
//! uniform percentage change from `[-max_change, +max_change]`, applies the new
//! price (floor-clamped) to the registry and publishes the resulting
//! `PriceUpdate` through the hub.
//!
//! The mutator owns its random generator, seeded once at construction, so draws
//! never interleave with any other thread. It is the only writer of the registry
//! and the only publisher on the hub.
//!
//! Failure model: an error out of `tick` means an invariant was broken (an
//! instrument vanished or a price escaped the positive range). `run` returns it
//! and the process is expected to stop rather than retry.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, never, select, tick};
use feed_common::{PriceUpdate, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::FeedConfig;
use crate::model::hub::BroadcastHub;
use crate::model::registry::InstrumentRegistry;

/// Next price for `current` after a fractional change of `pct`, never below `floor`.
///
/// `pct` is a fraction: `0.02` means +2%.
pub fn next_price(current: f64, pct: f64, floor: f64) -> f64 {
    (current * (1.0 + pct)).max(floor)
}

/// Periodic bounded random walk over every registered instrument.
pub struct PriceMutator<R = StdRng> {
    registry: Arc<InstrumentRegistry>,
    hub: Arc<BroadcastHub>,
    rng: R,
    interval: Duration,
    floor: f64,
    max_change: f64,
    ticks: u64,
}

impl PriceMutator<StdRng> {
    /// Create a mutator with a private generator.
    ///
    /// Uses `config.seed` when set (reproducible runs), OS entropy otherwise.
    pub fn new(
        registry: Arc<InstrumentRegistry>,
        hub: Arc<BroadcastHub>,
        config: &FeedConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(registry, hub, config, rng)
    }
}

impl<R: Rng> PriceMutator<R> {
    /// Create a mutator drawing from `rng`.
    pub fn with_rng(
        registry: Arc<InstrumentRegistry>,
        hub: Arc<BroadcastHub>,
        config: &FeedConfig,
        rng: R,
    ) -> Self {
        Self {
            registry,
            hub,
            rng,
            interval: config.tick_interval,
            floor: config.floor_price,
            max_change: config.max_change,
            ticks: 0,
        }
    }

    /// Draw a fractional change from the closed interval `[-max_change, +max_change]`.
    pub fn draw(&mut self) -> f64 {
        self.rng.random_range(-self.max_change..=self.max_change)
    }

    /// Apply a given fractional change to `symbol` and publish the delta.
    pub fn apply_change(&self, symbol: &str, pct: f64) -> Result<PriceUpdate> {
        let old_price = self.registry.lookup(symbol)?.price;
        let new_price = next_price(old_price, pct, self.floor);
        self.registry.apply_delta(symbol, new_price)?;

        let update = PriceUpdate {
            symbol: symbol.to_string(),
            price: new_price,
            change: new_price - old_price,
            change_pct: pct * 100.0,
        };
        self.hub.publish(&update);
        Ok(update)
    }

    /// One update-and-publish cycle over every instrument.
    pub fn tick(&mut self) -> Result<Vec<PriceUpdate>> {
        let symbols = self.registry.symbols();
        let dropped_before = self.hub.total_dropped();
        let mut updates = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            let pct = self.draw();
            updates.push(self.apply_change(symbol, pct)?);
        }
        self.ticks += 1;
        debug!(
            "Tick {}: {} prices updated, {} subscribers, {} deliveries dropped",
            self.ticks,
            updates.len(),
            self.hub.subscriber_count(),
            self.hub.total_dropped().saturating_sub(dropped_before)
        );
        Ok(updates)
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick forever at the configured interval.
    pub fn run(self) -> Result<()> {
        self.run_until(never())
    }

    /// Tick at the configured interval until `shutdown` fires or disconnects.
    ///
    /// The ticker keeps a fixed schedule, so time spent inside a tick does not
    /// push later ticks back.
    pub fn run_until(mut self, shutdown: Receiver<()>) -> Result<()> {
        info!(
            "Price mutator started: {} instruments every {:?} (Thread ID: {:?})",
            self.registry.len(),
            self.interval,
            thread::current().id()
        );
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(shutdown) -> _ => break,
                recv(ticker) -> _ => {
                    self.tick()?;
                },
            }
        }
        info!("Price mutator stopped after {} ticks", self.ticks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_common::{FeedError, Instrument};

    fn setup(instruments: Vec<Instrument>) -> (Arc<InstrumentRegistry>, Arc<BroadcastHub>) {
        (
            Arc::new(InstrumentRegistry::new(instruments).unwrap()),
            Arc::new(BroadcastHub::default()),
        )
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn next_price_clamps_to_floor() {
        assert_eq!(next_price(0.0051, -0.02, 0.01), 0.01);
        assert!(approx(next_price(100.0, 0.02, 0.01), 102.0));
    }

    #[test]
    fn forced_up_move_matches_expected_update() {
        let registry = Arc::new(InstrumentRegistry::with_defaults());
        let hub = Arc::new(BroadcastHub::default());
        let sub = hub.subscribe();
        let mutator = PriceMutator::new(registry.clone(), hub, &FeedConfig::default());

        let update = mutator.apply_change("AAPL", 0.02).unwrap();
        assert_eq!(update.symbol, "AAPL");
        assert!(approx(update.price, 179.01));
        assert!(approx(update.change, 3.51));
        assert!(approx(update.change_pct, 2.0));
        assert!(approx(registry.lookup("AAPL").unwrap().price, 179.01));
        assert_eq!(sub.receiver.try_recv().unwrap(), update);
    }

    #[test]
    fn forced_down_move_clamps_tiny_price() {
        let (registry, hub) = setup(vec![Instrument::new("PENNY", 0.0051)]);
        let mutator = PriceMutator::new(registry.clone(), hub, &FeedConfig::default());

        let update = mutator.apply_change("PENNY", -0.02).unwrap();
        assert_eq!(update.price, 0.01);
        assert_eq!(registry.lookup("PENNY").unwrap().price, 0.01);
        assert!(approx(update.change, 0.01 - 0.0051));
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let (registry, hub) = setup(vec![Instrument::new("AAPL", 1.0)]);
        let mutator = PriceMutator::new(registry, hub, &FeedConfig::default());
        assert!(matches!(
            mutator.apply_change("ZZZZ", 0.01),
            Err(FeedError::NotFound(_))
        ));
    }

    #[test]
    fn draws_stay_within_bounds() {
        let (registry, hub) = setup(vec![Instrument::new("AAPL", 1.0)]);
        let config = FeedConfig {
            seed: Some(7),
            ..FeedConfig::default()
        };
        let mut mutator = PriceMutator::new(registry, hub, &config);
        for _ in 0..10_000 {
            let pct = mutator.draw();
            assert!((-0.02..=0.02).contains(&pct), "draw {pct} out of range");
        }
    }

    #[test]
    fn tick_updates_and_publishes_every_instrument() {
        let registry = Arc::new(InstrumentRegistry::with_defaults());
        let hub = Arc::new(BroadcastHub::default());
        let sub = hub.subscribe();
        let mut mutator = PriceMutator::with_rng(
            registry.clone(),
            hub,
            &FeedConfig::default(),
            StdRng::seed_from_u64(1),
        );

        let updates = mutator.tick().unwrap();
        assert_eq!(updates.len(), 5);
        assert_eq!(mutator.ticks(), 1);
        assert_eq!(sub.receiver.len(), 5);
        for update in &updates {
            assert_eq!(registry.lookup(&update.symbol).unwrap().price, update.price);
        }
    }

    #[test]
    fn same_seed_gives_same_walk() {
        let config = FeedConfig {
            seed: Some(42),
            ..FeedConfig::default()
        };
        let run = || {
            let (registry, hub) = setup(vec![Instrument::new("AAPL", 100.0)]);
            let mut mutator = PriceMutator::new(registry, hub, &config);
            (0..5)
                .map(|_| mutator.tick().unwrap()[0].price)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn run_until_stops_on_shutdown() {
        let (registry, hub) = setup(vec![Instrument::new("AAPL", 100.0)]);
        let config = FeedConfig {
            tick_interval: Duration::from_millis(5),
            ..FeedConfig::default()
        };
        let sub = hub.subscribe();
        let mutator = PriceMutator::new(registry, hub, &config);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::spawn(move || mutator.run_until(stop_rx));

        // wait for at least one tick to land
        sub.receiver
            .recv_timeout(Duration::from_secs(2))
            .expect("mutator never ticked");
        stop_tx.send(()).unwrap();
        assert!(handle.join().unwrap().is_ok());
    }
}
