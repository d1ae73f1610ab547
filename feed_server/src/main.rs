//! Live price feed server.
//!
//! Wires the price core to its transports:
//!
//! - `PriceMutator`: background thread moving every price once per tick and
//!   publishing each change through the `BroadcastHub`.
//! - `CommandReceiver`: TCP listener answering `PRICES`/`LOOKUP`/`PING` from the
//!   `InstrumentRegistry` and forwarding accepted `SUBSCRIBE` requests here.
//! - `SessionTable`: one hub subscription plus one UDP stream thread per client.
//! - `UdpPingListener` + ping checker: keep-alive tracking; a silent client's
//!   session is closed, which unsubscribes it from the hub.
//!
//! The main thread runs `SessionTable::run`, which multiplexes subscribe
//! requests, keep-alive timeouts, self-terminated streams and mutator faults. A
//! mutator fault or a lost input channel ends the process with an error.
#![warn(missing_docs)]
use crate::args::ServerArgs;
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use feed_common::net::{COMMAND_PORT, DATA_PORT};
use feed_common::symbols::parse_instruments;
use feed_common::{FeedError, Result};
use feed_server::model::ping_monitor::PingMonitor;
use feed_server::receiver::{CommandHandler, CommandReceiver};
use feed_server::session::{SessionEvents, SessionTable, StreamEnded, SubscribeRequest};
use feed_server::udp_listener::UdpPingListener;
use feed_server::{BroadcastHub, InstrumentRegistry, PriceMutator};
use log::{error, info};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod args;

/// How often silent clients are looked for.
const PING_CHECK_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    init_logger();
    let args = ServerArgs::parse();
    let config = args.to_config()?;

    let registry = Arc::new(load_registry(args.instruments.as_deref())?);
    let hub = Arc::new(BroadcastHub::new(config.queue_capacity));
    info!(
        "Feed configured: {} instruments, tick {:?}, queue capacity {}",
        registry.len(),
        config.tick_interval,
        hub.capacity()
    );

    let udp_socket = Arc::new(UdpSocket::bind(format!("0.0.0.0:{}", DATA_PORT))?);
    info!("UDP socket created on: {}", udp_socket.local_addr()?);

    let ping_monitor = Arc::new(Mutex::new(PingMonitor::new(config.ping_timeout)));
    UdpPingListener::start(Arc::clone(&udp_socket), Arc::clone(&ping_monitor))?;

    let (timeout_tx, timeout_rx) = unbounded::<SocketAddr>();
    start_ping_checker(Arc::clone(&ping_monitor), timeout_tx)?;

    let (subscribe_tx, subscribe_rx) = unbounded::<SubscribeRequest>();
    let receiver = CommandReceiver::new(
        &format!("0.0.0.0:{}", COMMAND_PORT),
        CommandHandler::new(Arc::clone(&registry), subscribe_tx),
    )?;
    thread::Builder::new()
        .name("command-receiver".to_string())
        .spawn(move || {
            if let Err(e) = receiver.receive_loop() {
                error!("Receiver loop failed: {}", e);
            }
        })?;

    let (fault_tx, fault_rx) = unbounded::<FeedError>();
    let mutator = PriceMutator::new(Arc::clone(&registry), Arc::clone(&hub), &config);
    thread::Builder::new()
        .name("price-mutator".to_string())
        .spawn(move || {
            if let Err(e) = mutator.run() {
                let _ = fault_tx.send(e);
            }
        })?;

    let (ended_tx, ended_rx) = unbounded::<StreamEnded>();
    let mut sessions = SessionTable::new(hub, registry, udp_socket, ended_tx);
    let events = SessionEvents {
        subscribe_rx,
        timeout_rx,
        ended_rx,
        fault_rx,
    };
    sessions.run(&ping_monitor, &events)
}

/// Registry from an instruments file, or the built-in instruments.
fn load_registry(path: Option<&str>) -> Result<InstrumentRegistry> {
    match path {
        Some(raw) => {
            let path = normalize_path(raw);
            let file = File::open(&path).map_err(|e| {
                FeedError::Format(format!("Cannot open {}: {}", path.display(), e))
            })?;
            let instruments = parse_instruments(BufReader::new(file))?;
            InstrumentRegistry::new(instruments)
        }
        None => Ok(InstrumentRegistry::with_defaults()),
    }
}

fn start_ping_checker(
    ping_monitor: Arc<Mutex<PingMonitor>>,
    timeout_tx: Sender<SocketAddr>,
) -> Result<()> {
    thread::Builder::new()
        .name("ping-checker".to_string())
        .spawn(move || {
            loop {
                thread::sleep(PING_CHECK_INTERVAL);
                let timed_out_clients = ping_monitor.lock().check_timeouts();
                for client_addr in timed_out_clients {
                    if timeout_tx.send(client_addr).is_err() {
                        return;
                    }
                }
            }
        })?;
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Trim whitespace and matching quotes from a CLI-provided path.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}
