use std::sync::Arc;

use feed_common::Instrument;
use feed_server::{BroadcastHub, FeedConfig, InstrumentRegistry, PriceMutator};
use proptest::prelude::*;

fn mutator_for(
    instruments: Vec<Instrument>,
    seed: u64,
) -> (Arc<InstrumentRegistry>, PriceMutator) {
    let registry = Arc::new(InstrumentRegistry::new(instruments).unwrap());
    let hub = Arc::new(BroadcastHub::default());
    let config = FeedConfig {
        seed: Some(seed),
        ..FeedConfig::default()
    };
    let mutator = PriceMutator::new(Arc::clone(&registry), hub, &config);
    (registry, mutator)
}

proptest! {
    #[test]
    fn every_tick_stays_within_two_percent_or_floor(
        seed in any::<u64>(),
        start in 0.001f64..10_000.0,
        ticks in 1usize..200,
    ) {
        let (registry, mut mutator) = mutator_for(vec![Instrument::new("AAPL", start)], seed);
        for _ in 0..ticks {
            let before = registry.lookup("AAPL").unwrap().price;
            let update = mutator.tick().unwrap().remove(0);
            let after = registry.lookup("AAPL").unwrap().price;

            prop_assert_eq!(after, update.price);
            prop_assert!(after > 0.0);
            let in_band = after >= before * 0.98 - 1e-12 && after <= before * 1.02 + 1e-12;
            prop_assert!(in_band || after == 0.01, "{} -> {}", before, after);
            prop_assert!(update.change_pct.abs() <= 2.0 + 1e-12);
        }
    }

    #[test]
    fn repeated_maximal_drops_never_cross_the_floor(start in 0.01f64..1.0, steps in 1usize..500) {
        let (registry, mutator) = mutator_for(vec![Instrument::new("PENNY", start)], 0);
        for _ in 0..steps {
            let update = mutator.apply_change("PENNY", -0.02).unwrap();
            prop_assert!(update.price >= 0.01);
        }
        prop_assert!(registry.lookup("PENNY").unwrap().price >= 0.01);
    }
}

#[test]
fn snapshot_reflects_every_tick() {
    let registry = Arc::new(InstrumentRegistry::with_defaults());
    let hub = Arc::new(BroadcastHub::default());
    let config = FeedConfig {
        seed: Some(2024),
        ..FeedConfig::default()
    };
    let mut mutator = PriceMutator::new(Arc::clone(&registry), hub, &config);

    let before = registry.snapshot();
    let mut changes = std::collections::HashMap::<String, (usize, f64)>::new();
    for _ in 0..25 {
        for update in mutator.tick().unwrap() {
            let entry = changes.entry(update.symbol).or_default();
            entry.0 += 1;
            entry.1 += update.change;
        }
    }
    let after = registry.snapshot();

    assert_eq!(mutator.ticks(), 25);
    for instrument in before {
        let (count, total_change) = changes[&instrument.symbol];
        assert_eq!(count, 25, "{} mutated {} times", instrument.symbol, count);
        let now = after
            .iter()
            .find(|i| i.symbol == instrument.symbol)
            .unwrap()
            .price;
        let expected = instrument.price + total_change;
        assert!(
            (now - expected).abs() < 1e-6 * instrument.price.max(1.0),
            "{}: {} != {}",
            instrument.symbol,
            now,
            expected
        );
    }
}
