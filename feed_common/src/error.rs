//! Error types shared between client and server.
//!
//! The `FeedError` enum covers the two domain outcomes of the price core (an
//! unknown symbol and a rejected price/instrument) together with the plumbing
//! failures of the command and streaming transports, so every crate can
//! propagate a single error type with `?`.
//!
//! A full subscriber queue is deliberately not represented here: dropping an
//! update for a backlogged subscriber is normal delivery policy, not a failure.
use std::io;

use thiserror::Error;

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Lookup of a symbol that is not part of the instrument set.
    ///
    /// Expected outcome of validation; callers turn it into a client error.
    #[error("Instrument not found: {0}")]
    NotFound(String),

    /// An instrument definition was rejected while seeding the registry.
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    /// A price write would break the positive-finite price invariant.
    #[error("Invalid price {price} for {symbol}")]
    InvalidPrice {
        /// Symbol the write targeted.
        symbol: String,
        /// Rejected price value.
        price: f64,
    },

    /// Text that is not a well-formed ticker symbol.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),
}

impl FeedError {
    /// `true` for errors caused by the caller's input rather than by the process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FeedError::NotFound(_) | FeedError::InvalidSymbol(_) | FeedError::Format(_)
        )
    }
}
