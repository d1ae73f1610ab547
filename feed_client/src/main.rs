//! Feed Client: subscribes to live price updates from the feed server and logs
//! every update it receives. It optionally reads a list of symbols from a text
//! file, sends a `SUBSCRIBE` command over TCP, keeps the stream alive with
//! periodic UDP `PING`s, and listens for updates until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --server-ip 192.168.0.10 --listen-port 55555 --path ./symbols.txt
//! feed_client --server-ip 192.168.0.10 --prices
//! feed_client --server-ip 192.168.0.10 --lookup AAPL
//! ```
#![warn(missing_docs)]
mod args;
mod sender;

use crate::args::Args;
use crate::sender::CommandSender;
use chrono::{Local, SecondsFormat};
use clap::Parser;
use feed_common::net::{COMMAND_PORT, DATA_PORT, addr};
use feed_common::symbols::parse_symbols;
use feed_common::{Command, FeedError, PriceUpdate, Reply, Result};
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// Runs a blocking loop that receives `PriceUpdate` datagrams from `socket`
/// and logs them. Returns an error if receiving fails.
fn start_receiver_loop(socket: Arc<UdpSocket>, shutdown: Arc<AtomicBool>) -> Result<()> {
    info!("Update receiver running on: {}", socket.local_addr()?);
    let mut buf = [0u8; 2048];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match PriceUpdate::from_json_slice(&buf[..size]) {
                Ok(update) => {
                    info!(
                        "{} {:<6} {:>10.2} {:>+9.2} ({:>+6.2}%)",
                        Local::now().format("%H:%M:%S"),
                        update.symbol,
                        update.price,
                        update.change,
                        update.change_pct
                    );
                }
                Err(_) => {
                    debug!(
                        "Received non-update message: {}",
                        String::from_utf8_lossy(&buf[..size])
                    );
                }
            },
            Err(e) => {
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                    continue;
                }
                error!("Receive data error: {}", e);
                return Err(e.into());
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let server_ip = args.server_ip.trim().replace('"', "");
    let server_command_address = addr(&server_ip, COMMAND_PORT);

    if args.prices {
        return print_reply(CommandSender::request(&server_command_address, &Command::prices())?);
    }
    if let Some(symbol) = &args.lookup {
        return print_reply(CommandSender::request(
            &server_command_address,
            &Command::lookup(symbol),
        )?);
    }

    let symbols = match &args.path {
        Some(raw) => {
            let path = normalize_path(raw);
            if !is_file_exist(&path) {
                return Err(FeedError::Format(format!(
                    "Symbols file not found: {}",
                    path.display()
                )));
            }
            parse_symbols(BufReader::new(File::open(path)?))?
        }
        None => Vec::new(),
    };
    info!("Symbols: {:?}", symbols);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl+C handler");
    }

    let mut listen_port = args.listen_port;
    if listen_port == DATA_PORT {
        warn!(
            "--listen-port={} matches the server DATA_PORT. A free local port will be selected.",
            listen_port
        );
        listen_port = 0;
    }
    let client_udp_socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", listen_port))?);
    client_udp_socket.set_read_timeout(Some(Duration::from_secs(5)))?;
    let client_local_addr = client_udp_socket.local_addr()?;
    info!("UDP client listening on: {}", client_local_addr);

    let command = Command::subscribe(
        &client_local_addr.ip().to_string(),
        client_local_addr.port(),
        symbols,
    );
    match CommandSender::request(&server_command_address, &command)? {
        Reply::Subscribed { address } => info!("Streaming to {}", address),
        Reply::Error { message } => {
            error!("Subscription rejected: {}", message);
            return Err(FeedError::Format(message));
        }
        other => {
            return Err(FeedError::Format(format!(
                "Unexpected reply to SUBSCRIBE: {:?}",
                other
            )));
        }
    }

    CommandSender::start_ping_thread(
        client_udp_socket.clone(),
        addr(&server_ip, DATA_PORT),
        shutdown.clone(),
    );

    info!("Client is running. Press Ctrl+C to exit.");
    start_receiver_loop(client_udp_socket, shutdown)
}

/// Print a one-shot reply (`--prices` / `--lookup`).
fn print_reply(reply: Reply) -> Result<()> {
    match reply {
        Reply::Prices {
            as_of,
            mut instruments,
        } => {
            instruments.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            println!("Prices as of {}", as_of.to_rfc3339_opts(SecondsFormat::Millis, true));
            for instrument in instruments {
                println!("{:<6} {:>10.2}", instrument.symbol, instrument.price);
            }
            Ok(())
        }
        Reply::Instrument(instrument) => {
            println!("{:<6} {:>10.2}", instrument.symbol, instrument.price);
            Ok(())
        }
        Reply::Error { message } => Err(FeedError::Format(message)),
        other => Err(FeedError::Format(format!("Unexpected reply: {:?}", other))),
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &Path) -> bool {
    path.exists() && path.is_file()
}
