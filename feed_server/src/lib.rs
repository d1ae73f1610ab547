//! Live price feed server library.
//!
//! The core is three explicitly owned objects, built once at startup and shared
//! by `Arc`:
//!
//! - `InstrumentRegistry`: current prices; snapshot, lookup and the single write path.
//! - `BroadcastHub`: subscriber queues; subscribe, unsubscribe and non-blocking publish.
//! - `PriceMutator`: the timer-driven random walk that writes the registry and
//!   publishes every change through the hub.
//!
//! Around the core sit the transports used by the binary: the TCP command
//! channel (`receiver`), the per-client UDP streams (`session`) and the UDP
//! keep-alive listener (`udp_listener`).
#![warn(missing_docs)]

pub mod config;
pub mod model;
pub mod receiver;
pub mod session;
pub mod udp_listener;

pub use config::FeedConfig;
pub use model::hub::{BroadcastHub, Delivery, PublishReport, SubscriberId, Subscription};
pub use model::mutator::{PriceMutator, next_price};
pub use model::registry::InstrumentRegistry;
