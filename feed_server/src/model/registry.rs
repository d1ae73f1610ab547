//! Instrument registry: the single source of truth for current prices.
//!
//! The registry owns a fixed set of instruments, seeded at construction, and
//! guards their prices with a read/write lock:
//!
//! - `InstrumentRegistry::snapshot()`: point-in-time copy of every instrument.
//! - `InstrumentRegistry::lookup(symbol)`: O(1) exact-match lookup, `NotFound`
//!   for unknown symbols.
//! - `InstrumentRegistry::apply_delta(symbol, price)`: exclusive write of one
//!   price; only the price mutator calls it.
//!
//! Readers share the lock and never block each other. The write section is a
//! single assignment, so readers only ever wait for that long and never see a
//! half-written instrument.

use std::collections::HashMap;

use feed_common::symbols::is_valid_symbol;
use feed_common::{FeedError, Instrument, Result};
use parking_lot::RwLock;

/// Instruments the server starts with when no instruments file is given.
pub const DEFAULT_INSTRUMENTS: [(&str, f64); 5] = [
    ("AAPL", 175.50),
    ("TSLA", 245.30),
    ("AMZN", 142.80),
    ("INFY", 18.25),
    ("TCS", 3450.75),
];

/// Lock-guarded map from symbol to current price.
#[derive(Debug)]
pub struct InstrumentRegistry {
    prices: RwLock<HashMap<String, f64>>,
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

impl InstrumentRegistry {
    /// Seed a registry with a fixed instrument set.
    ///
    /// The set must be non-empty, symbols must be canonical and unique, and every
    /// price must be positive and finite.
    pub fn new<I>(instruments: I) -> Result<Self>
    where
        I: IntoIterator<Item = Instrument>,
    {
        let mut prices = HashMap::new();
        for Instrument { symbol, price } in instruments {
            if !is_valid_symbol(&symbol) {
                return Err(FeedError::InvalidInstrument(format!(
                    "malformed symbol {:?}",
                    symbol
                )));
            }
            if !is_valid_price(price) {
                return Err(FeedError::InvalidInstrument(format!(
                    "{} has non-positive price {}",
                    symbol, price
                )));
            }
            if prices.insert(symbol.clone(), price).is_some() {
                return Err(FeedError::InvalidInstrument(format!(
                    "duplicate symbol {}",
                    symbol
                )));
            }
        }
        if prices.is_empty() {
            return Err(FeedError::InvalidInstrument(
                "instrument set is empty".to_string(),
            ));
        }
        Ok(Self {
            prices: RwLock::new(prices),
        })
    }

    /// Registry seeded with `DEFAULT_INSTRUMENTS`.
    pub fn with_defaults() -> Self {
        let prices = DEFAULT_INSTRUMENTS
            .iter()
            .map(|(symbol, price)| (symbol.to_string(), *price))
            .collect();
        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Consistent copy of every instrument, in no particular order.
    pub fn snapshot(&self) -> Vec<Instrument> {
        self.prices
            .read()
            .iter()
            .map(|(symbol, price)| Instrument::new(symbol.clone(), *price))
            .collect()
    }

    /// Current state of `symbol`.
    pub fn lookup(&self, symbol: &str) -> Result<Instrument> {
        self.prices
            .read()
            .get(symbol)
            .map(|price| Instrument::new(symbol, *price))
            .ok_or_else(|| FeedError::NotFound(symbol.to_string()))
    }

    /// Replace the price of `symbol`, returning the previous price.
    pub fn apply_delta(&self, symbol: &str, new_price: f64) -> Result<f64> {
        if !is_valid_price(new_price) {
            return Err(FeedError::InvalidPrice {
                symbol: symbol.to_string(),
                price: new_price,
            });
        }
        let mut prices = self.prices.write();
        let slot = prices
            .get_mut(symbol)
            .ok_or_else(|| FeedError::NotFound(symbol.to_string()))?;
        Ok(std::mem::replace(slot, new_price))
    }

    /// All symbols, in no particular order.
    pub fn symbols(&self) -> Vec<String> {
        self.prices.read().keys().cloned().collect()
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.prices.read().len()
    }

    /// `true` if the registry holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.prices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lookup_unknown_symbol_is_not_found() {
        let registry = InstrumentRegistry::with_defaults();
        let err = registry.lookup("ZZZZ").unwrap_err();
        assert!(matches!(err, FeedError::NotFound(s) if s == "ZZZZ"));
    }

    #[test]
    fn lookup_is_exact_match() {
        let registry = InstrumentRegistry::with_defaults();
        assert_eq!(registry.lookup("AAPL").unwrap().price, 175.50);
        assert!(registry.lookup("aapl").is_err());
    }

    #[test]
    fn snapshot_contains_every_default_instrument() {
        let registry = InstrumentRegistry::with_defaults();
        let mut symbols: Vec<_> = registry.snapshot().into_iter().map(|i| i.symbol).collect();
        symbols.sort();
        assert_eq!(symbols, vec!["AAPL", "AMZN", "INFY", "TCS", "TSLA"]);
        assert_eq!(registry.len(), 5);
        assert!(!registry.is_empty());
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let registry = InstrumentRegistry::with_defaults();
        let before = registry.snapshot();
        registry.apply_delta("TCS", 1.0).unwrap();
        let tcs = before.iter().find(|i| i.symbol == "TCS").unwrap();
        assert_eq!(tcs.price, 3450.75);
        assert_eq!(registry.lookup("TCS").unwrap().price, 1.0);
    }

    #[test]
    fn apply_delta_returns_previous_price() {
        let registry = InstrumentRegistry::with_defaults();
        assert_eq!(registry.apply_delta("AAPL", 179.01).unwrap(), 175.50);
        assert_eq!(registry.lookup("AAPL").unwrap().price, 179.01);
    }

    #[test]
    fn apply_delta_rejects_unknown_symbol_and_bad_price() {
        let registry = InstrumentRegistry::with_defaults();
        assert!(matches!(
            registry.apply_delta("ZZZZ", 1.0),
            Err(FeedError::NotFound(_))
        ));
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                registry.apply_delta("AAPL", bad),
                Err(FeedError::InvalidPrice { .. })
            ));
        }
        assert_eq!(registry.lookup("AAPL").unwrap().price, 175.50);
    }

    #[test]
    fn new_rejects_bad_seeds() {
        assert!(InstrumentRegistry::new(Vec::new()).is_err());
        assert!(InstrumentRegistry::new(vec![Instrument::new("aapl", 1.0)]).is_err());
        assert!(InstrumentRegistry::new(vec![Instrument::new("AAPL", 0.0)]).is_err());
        assert!(
            InstrumentRegistry::new(vec![
                Instrument::new("AAPL", 1.0),
                Instrument::new("AAPL", 2.0),
            ])
            .is_err()
        );
    }

    #[test]
    fn readers_never_see_torn_writes() {
        let registry = Arc::new(
            InstrumentRegistry::new(vec![Instrument::new("AAPL", 1.0)]).unwrap(),
        );
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 1..=1_000 {
                    registry.apply_delta("AAPL", i as f64).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let mut last = 0.0;
                    for _ in 0..1_000 {
                        let price = registry.lookup("AAPL").unwrap().price;
                        assert!(price >= last, "price went backwards: {last} -> {price}");
                        assert_eq!(price.fract(), 0.0);
                        last = price;
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.lookup("AAPL").unwrap().price, 1_000.0);
    }
}
