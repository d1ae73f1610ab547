//! Ticker symbol validation and list parsing shared between client and server.
//!
//! A symbol is a short uppercase ticker: 1 to `MAX_SYMBOL_LEN` characters of
//! `A-Z`, `0-9`, `.` or `-`, starting with a letter. Input is trimmed and
//! uppercased before validation, so `" aapl "` normalizes to `"AAPL"`.

use std::collections::HashSet;
use std::io::BufRead;

use crate::error::FeedError;
use crate::result::Result;
use crate::update::Instrument;

/// Longest accepted symbol.
pub const MAX_SYMBOL_LEN: usize = 10;

/// Returns `true` if `symbol` is already in canonical form.
pub fn is_valid_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    symbol.len() <= MAX_SYMBOL_LEN
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

/// Trim and uppercase `raw`, then validate it.
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    if is_valid_symbol(&symbol) {
        Ok(symbol)
    } else {
        Err(FeedError::InvalidSymbol(raw.to_string()))
    }
}

/// Parse a list of symbols from a buffered reader.
///
/// Symbols may be separated by commas, spaces or new lines. Blank lines and
/// lines starting with `#` are skipped; duplicates are kept once, in first-seen
/// order.
pub fn parse_symbols<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let symbol = normalize_symbol(token)?;
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            }
        }
    }
    Ok(symbols)
}

/// Parse instrument definitions, one `SYMBOL PRICE` (or `SYMBOL=PRICE`) per line.
///
/// Blank lines and `#` comments are skipped. Duplicate symbols are rejected here
/// rather than silently overwritten.
pub fn parse_instruments<R: BufRead>(reader: R) -> Result<Vec<Instrument>> {
    let mut seen = HashSet::new();
    let mut instruments = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line
            .split(|c: char| c == '=' || c.is_whitespace())
            .filter(|t| !t.is_empty());
        let (Some(symbol), Some(price), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FeedError::InvalidInstrument(format!(
                "line {}: expected `SYMBOL PRICE`, got {:?}",
                idx + 1,
                line
            )));
        };
        let symbol = normalize_symbol(symbol)?;
        let price: f64 = price.parse().map_err(|e| {
            FeedError::InvalidInstrument(format!("line {}: bad price {:?}: {}", idx + 1, price, e))
        })?;
        if !seen.insert(symbol.clone()) {
            return Err(FeedError::InvalidInstrument(format!(
                "line {}: duplicate symbol {}",
                idx + 1,
                symbol
            )));
        }
        instruments.push(Instrument::new(symbol, price));
    }
    Ok(instruments)
}
