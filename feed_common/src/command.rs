//! Shared protocol command type used by client and server.
//!
//! Each TCP connection to `COMMAND_PORT` carries exactly one JSON `Command` and
//! is answered with exactly one JSON `Reply`:
//!
//! - `SUBSCRIBE`: start streaming price updates over UDP to `address:port`,
//!   optionally filtered to `symbols` (empty means every instrument).
//! - `PRICES`: one-shot snapshot of all current prices.
//! - `LOOKUP`: validate a single symbol and return its current price.
//! - `PING`: liveness probe; keep-alives for streams travel over UDP instead.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::FeedError;
use crate::result::Result;
use crate::update::Instrument;

/// Kind of request carried by a `Command`.
///
/// Parsed case-insensitively, always rendered uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum CommandKind {
    /// Start a UDP price stream.
    Subscribe,
    /// Snapshot of all prices.
    Prices,
    /// Single-symbol lookup.
    Lookup,
    /// Liveness probe.
    Ping,
}

impl TryFrom<String> for CommandKind {
    type Error = strum::ParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommandKind> for String {
    fn from(kind: CommandKind) -> Self {
        kind.to_string()
    }
}

/// Command payload sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Request kind.
    pub kind: CommandKind,
    /// Client IP address the stream targets (SUBSCRIBE only).
    #[serde(default)]
    pub address: String,
    /// Client UDP port the stream targets (SUBSCRIBE only).
    #[serde(default)]
    pub port: u16,
    /// Symbol filter for SUBSCRIBE, or the single symbol for LOOKUP.
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl Command {
    fn bare(kind: CommandKind) -> Self {
        Command {
            kind,
            address: String::new(),
            port: 0,
            symbols: Vec::new(),
        }
    }

    /// Creates a new `SUBSCRIBE` command; an empty `symbols` list streams everything.
    pub fn subscribe(address: &str, port: u16, symbols: Vec<String>) -> Self {
        Command {
            address: String::from(address),
            port,
            symbols,
            ..Self::bare(CommandKind::Subscribe)
        }
    }

    /// Creates a new `PRICES` snapshot request.
    pub fn prices() -> Self {
        Self::bare(CommandKind::Prices)
    }

    /// Creates a new `LOOKUP` request for `symbol`.
    pub fn lookup(symbol: &str) -> Self {
        Command {
            symbols: vec![String::from(symbol)],
            ..Self::bare(CommandKind::Lookup)
        }
    }

    /// Creates a new `PING` probe.
    pub fn ping() -> Self {
        Self::bare(CommandKind::Ping)
    }

    /// Encode the command to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a command from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Server answer to a single `Command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "lowercase")]
pub enum Reply {
    /// Stream registered for `address`.
    Subscribed {
        /// UDP address updates will be sent to.
        address: String,
    },
    /// Snapshot of all instruments.
    Prices {
        /// Time the snapshot was taken.
        as_of: DateTime<Utc>,
        /// Instruments in no particular order.
        instruments: Vec<Instrument>,
    },
    /// Result of a successful lookup.
    Instrument(Instrument),
    /// Answer to a TCP `PING`.
    Pong,
    /// Request rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl Reply {
    /// Error reply carrying the display form of `err`.
    pub fn error(err: &FeedError) -> Self {
        Reply::Error {
            message: err.to_string(),
        }
    }

    /// Encode the reply to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a reply from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
