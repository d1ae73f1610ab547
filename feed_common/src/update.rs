//! Price payloads shared by the server and its subscribers.
//!
//! `Instrument` is a point-in-time `{symbol, price}` pair as returned by a
//! registry snapshot or lookup. `PriceUpdate` is the immutable delta emitted on
//! every price mutation and streamed to clients as one JSON document per
//! datagram:
//!
//! ```json
//! {"symbol":"AAPL","price":179.01,"change":3.51,"changePct":2.0}
//! ```
use serde::{Deserialize, Serialize};

use crate::result::Result;

/// A tradable symbol with its current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Uppercase ticker symbol.
    pub symbol: String,
    /// Current price, always positive.
    pub price: f64,
}

impl Instrument {
    /// Create an instrument from a symbol and a price.
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Change of a single instrument's price produced by one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    /// Symbol of the mutated instrument.
    pub symbol: String,
    /// Price after the mutation.
    pub price: f64,
    /// Absolute change, new minus old.
    pub change: f64,
    /// Drawn change as a percentage value (`1.5` means 1.5%).
    pub change_pct: f64,
}

impl PriceUpdate {
    /// Zero-delta update carrying an instrument's current price.
    ///
    /// Sessions send one of these per instrument before streaming live deltas.
    pub fn from_instrument(instrument: &Instrument) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            price: instrument.price,
            change: 0.0,
            change_pct: 0.0,
        }
    }

    /// Encode the update to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an update from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
