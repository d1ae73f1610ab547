//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the price feed is running.
    #[clap(long)]
    pub server_ip: String,

    /// Local UDP port to bind for receiving updates and sending pings (0 picks a free port).
    #[clap(long, default_value_t = 0)]
    pub listen_port: u16,

    /// Path to a text file with symbols to subscribe to; all symbols if omitted.
    /// Symbols may be separated by commas, spaces, or new lines.
    #[clap(long)]
    pub path: Option<String>,

    /// Print the current prices once and exit.
    #[clap(long, conflicts_with = "lookup")]
    pub prices: bool,

    /// Print the current price of one symbol and exit.
    #[clap(long)]
    pub lookup: Option<String>,
}
