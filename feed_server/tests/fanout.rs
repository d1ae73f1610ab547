use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::TryRecvError;
use feed_common::PriceUpdate;
use feed_server::{BroadcastHub, FeedConfig, InstrumentRegistry, PriceMutator};

fn update(price: f64) -> PriceUpdate {
    PriceUpdate {
        symbol: "AAPL".into(),
        price,
        change: 0.0,
        change_pct: 0.0,
    }
}

#[test]
fn backlogged_subscriber_sees_a_gap_while_others_get_everything() {
    let registry = Arc::new(InstrumentRegistry::with_defaults());
    let hub = Arc::new(BroadcastHub::new(10));
    let config = FeedConfig {
        seed: Some(11),
        ..FeedConfig::default()
    };
    let mut mutator = PriceMutator::new(Arc::clone(&registry), Arc::clone(&hub), &config);

    let a = hub.subscribe();
    let b = hub.subscribe();

    // two ticks of five instruments fill A exactly
    mutator.tick().unwrap();
    mutator.tick().unwrap();
    assert!(a.receiver.is_full());
    assert_eq!(b.receiver.try_iter().count(), 10);

    let published = mutator.tick().unwrap();
    assert_eq!(published.len(), 5);
    let received_by_b: Vec<PriceUpdate> = b.receiver.try_iter().collect();
    assert_eq!(received_by_b, published);
    assert_eq!(a.receiver.try_iter().count(), 10);
    assert_eq!(hub.total_dropped(), 5);
}

#[test]
fn publish_never_blocks_on_full_queues() {
    let hub = BroadcastHub::new(1);
    let stalled: Vec<_> = (0..500).map(|_| hub.subscribe()).collect();
    hub.publish(&update(1.0));

    let started = Instant::now();
    for i in 0..100 {
        let report = hub.publish(&update(i as f64));
        assert_eq!(report.dropped, stalled.len());
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    for sub in &stalled {
        assert_eq!(sub.receiver.len(), 1);
    }
}

#[test]
fn unsubscribed_queue_is_closed_for_its_drainer() {
    let hub = Arc::new(BroadcastHub::default());
    let sub = hub.subscribe();
    let id = sub.id;

    let drainer = thread::spawn(move || sub.receiver.iter().count());
    hub.publish(&update(1.0));
    hub.publish(&update(2.0));
    assert!(hub.unsubscribe(id));
    hub.publish(&update(3.0));

    // iter() ends only once the queue is closed
    assert_eq!(drainer.join().unwrap(), 2);
}

#[test]
fn concurrent_unsubscribe_during_publish_is_safe() {
    let hub = Arc::new(BroadcastHub::new(10_000));
    let subs: Vec<_> = (0..64).map(|_| hub.subscribe()).collect();

    let publisher = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            for i in 0..2_000 {
                hub.publish(&update(i as f64));
            }
        })
    };
    let ids: Vec<_> = subs.iter().map(|s| s.id).collect();
    let unsubscriber = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            for id in ids {
                assert!(hub.unsubscribe(id));
                thread::yield_now();
            }
        })
    };
    publisher.join().unwrap();
    unsubscriber.join().unwrap();

    assert_eq!(hub.subscriber_count(), 0);
    for sub in subs {
        let prices: Vec<f64> = sub.receiver.try_iter().map(|u| u.price).collect();
        // FIFO: whatever arrived is a prefix of the published sequence
        for (expected, got) in prices.iter().enumerate() {
            assert_eq!(*got, expected as f64);
        }
        assert_eq!(sub.receiver.try_recv(), Err(TryRecvError::Disconnected));
    }
}
