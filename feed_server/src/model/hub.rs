//! Broadcast hub: lossy, non-blocking fan-out of price updates.
//!
//! Every subscriber owns a bounded `crossbeam_channel` queue. The hub keeps the
//! sending half of each queue in a membership map and the session keeps the
//! receiving half:
//!
//! - `BroadcastHub::subscribe()`: allocate and register a new queue.
//! - `BroadcastHub::unsubscribe(id)`: remove the queue and drop its sender, which
//!   closes it for the draining session.
//! - `BroadcastHub::publish(update)`: `try_send` into every registered queue. A
//!   full queue loses that update for that subscriber only.
//!
//! Locking:
//! - The membership mutex covers the map only. `publish` copies the slot handles
//!   out under it and delivers after releasing it, so subscribe and unsubscribe
//!   never wait behind a broadcast.
//! - Each slot has its own lock around its sender. A delivery holds it for one
//!   `try_send`; `unsubscribe` takes the sender out under it. Once `unsubscribe`
//!   returns, no publish can deliver into that queue, even one already in flight.
//! - `try_send` never waits on a consumer, so a stalled session cannot hold up
//!   the mutator or its peers.
//! - No backlog is replayed on subscribe.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use feed_common::PriceUpdate;
use log::{debug, trace, warn};
use parking_lot::Mutex;

/// Default number of pending updates a subscriber queue can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Identity of a registered subscriber queue.
pub type SubscriberId = u64;

/// Receiving side of a subscriber queue, handed to the session that drains it.
///
/// `recv` returns an error once the queue has been unsubscribed and drained.
#[derive(Debug)]
pub struct Subscription {
    /// Handle to pass back to `BroadcastHub::unsubscribe`.
    pub id: SubscriberId,
    /// FIFO of pending updates.
    pub receiver: Receiver<PriceUpdate>,
}

/// Outcome of enqueueing one update for one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The update was queued.
    Delivered,
    /// The queue was full or its receiver is gone; the update is discarded for
    /// this subscriber.
    Dropped,
}

/// Per-call summary of a `publish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the update.
    pub delivered: usize,
    /// Subscribers that missed it.
    pub dropped: usize,
}

/// Sending half of one subscriber queue; empty once unsubscribed.
#[derive(Debug)]
struct Slot(Mutex<Option<Sender<PriceUpdate>>>);

impl Slot {
    /// `None` if the slot was closed after the publish picked it up.
    fn deliver(&self, update: &PriceUpdate) -> Option<Delivery> {
        let sender = self.0.lock();
        let result = sender.as_ref()?.try_send(update.clone());
        Some(match result {
            Ok(()) => Delivery::Delivered,
            // backlogged subscriber: lossy by policy
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            // session dropped its receiver; it still owes us an unsubscribe
            Err(TrySendError::Disconnected(_)) => Delivery::Dropped,
        })
    }

    /// Drop the only sender, which closes the queue.
    fn close(&self) {
        self.0.lock().take();
    }
}

/// Registered subscriber queues.
#[derive(Debug)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<Slot>>>,
    capacity: usize,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl BroadcastHub {
    /// Create a hub whose queues hold `capacity` pending updates each.
    ///
    /// A zero capacity would make every non-blocking delivery fail, so it is
    /// raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!("Subscriber queue capacity 0 is unusable, using 1");
            1
        } else {
            capacity
        };
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity,
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber queue; it receives every publish from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let total = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, Arc::new(Slot(Mutex::new(Some(tx)))));
            subscribers.len()
        };
        debug!("Subscriber {} added. Total subscribers: {}", id, total);
        Subscription { id, receiver: rx }
    }

    /// Remove and close the queue registered as `id`.
    ///
    /// Returns `false` if `id` was not registered, so a repeated call is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };
        match removed {
            Some(slot) => {
                slot.close();
                debug!("Subscriber {} removed. Total subscribers: {}", id, total);
                true
            }
            None => false,
        }
    }

    /// Offer `update` to every registered queue without blocking.
    pub fn publish(&self, update: &PriceUpdate) -> PublishReport {
        let slots: Vec<(SubscriberId, Arc<Slot>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut report = PublishReport::default();
        for (id, slot) in &slots {
            match slot.deliver(update) {
                Some(Delivery::Delivered) => report.delivered += 1,
                Some(Delivery::Dropped) => {
                    trace!("Dropped {} update for subscriber {}", update.symbol, id);
                    report.dropped += 1;
                }
                // unsubscribed mid-broadcast
                None => {}
            }
        }
        if report.dropped > 0 {
            self.dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
        report
    }

    /// Number of registered queues.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Capacity of every queue created by this hub.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Updates dropped across all subscribers since the hub was created.
    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
