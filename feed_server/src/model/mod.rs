//! Core price model of the feed server.
//!
//! - `registry`: authoritative symbol → price map (`InstrumentRegistry`).
//! - `hub`: bounded, lossy fan-out of `PriceUpdate`s to subscribers (`BroadcastHub`).
//! - `mutator`: periodic bounded random walk driving both (`PriceMutator`).
//! - `ping_monitor`: keep-alive tracker for UDP streaming clients.

pub mod hub;
pub mod mutator;
pub mod ping_monitor;
pub mod registry;
