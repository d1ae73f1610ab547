//!
//! Common types and utilities shared by the price feed server and client.
//!
//! This crate aggregates:
//! - `error`: unified error type `FeedError` used across the workspace.
//! - `result`: handy `Result<T, FeedError>` alias.
//! - `symbols`: symbol validation and symbol/instrument list parsing.
//! - `update`: `Instrument` and `PriceUpdate` wire payloads.
//! - `command`: TCP command and reply payloads exchanged between client and server.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod net;
pub mod result;
pub mod symbols;
pub mod update;

pub use command::{Command, CommandKind, Reply};
pub use error::FeedError;
pub use result::Result;
pub use update::{Instrument, PriceUpdate};
