//! TCP command channel.
//!
//! Every connection carries one newline-terminated JSON `Command` and gets one
//! newline-terminated JSON `Reply` back. `PRICES`, `LOOKUP` and `PING` are
//! answered straight from the registry; an accepted `SUBSCRIBE` is forwarded to
//! the session loop over a channel.
//!
//! A malformed or rejected command only affects its own connection: the accept
//! loop logs the problem, answers with `Reply::Error` where it still can, and
//! keeps serving other clients.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Sender;
use feed_common::symbols::normalize_symbol;
use feed_common::{Command, CommandKind, FeedError, Reply, Result};
use log::{debug, error, info, warn};

use crate::model::registry::InstrumentRegistry;
use crate::session::{SubscribeRequest, SymbolFilter};

/// Longest command accepted, in bytes.
pub const MAX_COMMAND_BYTES: u64 = 64 * 1024;
/// How long a connection may take to deliver its command.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Turns commands into replies.
#[derive(Clone)]
pub struct CommandHandler {
    registry: Arc<InstrumentRegistry>,
    subscribe_tx: Sender<SubscribeRequest>,
}

impl CommandHandler {
    /// Handler answering from `registry` and forwarding subscriptions to `subscribe_tx`.
    pub fn new(registry: Arc<InstrumentRegistry>, subscribe_tx: Sender<SubscribeRequest>) -> Self {
        Self {
            registry,
            subscribe_tx,
        }
    }

    /// Reply to `cmd` sent from `peer`. Client mistakes become `Reply::Error`.
    pub fn handle(&self, cmd: &Command, peer: SocketAddr) -> Reply {
        let result = match cmd.kind {
            CommandKind::Prices => Ok(Reply::Prices {
                as_of: Utc::now(),
                instruments: self.registry.snapshot(),
            }),
            CommandKind::Lookup => self.lookup(cmd),
            CommandKind::Subscribe => self.subscribe(cmd, peer),
            CommandKind::Ping => Ok(Reply::Pong),
        };
        result.unwrap_or_else(|e| {
            if e.is_client_error() {
                debug!("Rejected {} from {}: {}", cmd.kind, peer, e);
            } else {
                error!("Failed to handle {} from {}: {}", cmd.kind, peer, e);
            }
            Reply::error(&e)
        })
    }

    fn lookup(&self, cmd: &Command) -> Result<Reply> {
        let [symbol] = cmd.symbols.as_slice() else {
            return Err(FeedError::Format(format!(
                "LOOKUP takes exactly one symbol, got {}",
                cmd.symbols.len()
            )));
        };
        let instrument = self.registry.lookup(&normalize_symbol(symbol)?)?;
        Ok(Reply::Instrument(instrument))
    }

    fn subscribe(&self, cmd: &Command, peer: SocketAddr) -> Result<Reply> {
        let target = resolve_target(cmd, peer)?;
        let mut symbols = Vec::with_capacity(cmd.symbols.len());
        for raw in &cmd.symbols {
            let symbol = normalize_symbol(raw)?;
            self.registry.lookup(&symbol)?;
            symbols.push(symbol);
        }
        self.subscribe_tx
            .send(SubscribeRequest {
                target,
                filter: SymbolFilter::new(symbols),
            })
            .map_err(|e| FeedError::ChannelSend(e.to_string()))?;
        Ok(Reply::Subscribed {
            address: target.to_string(),
        })
    }
}

/// UDP address a subscription streams to.
///
/// Uses the address in the command when it names a concrete host, the TCP
/// peer's IP otherwise (clients usually bind `0.0.0.0`).
pub fn resolve_target(cmd: &Command, peer: SocketAddr) -> Result<SocketAddr> {
    if cmd.port == 0 {
        return Err(FeedError::Format("SUBSCRIBE needs a UDP port".into()));
    }
    let ip = match cmd.address.parse::<IpAddr>() {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => peer.ip(),
    };
    Ok(SocketAddr::new(ip, cmd.port))
}

/// TCP command receiver.
pub struct CommandReceiver {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
    handler: CommandHandler,
}

impl CommandReceiver {
    /// Bind a new receiver to `bind_addr` (e.g., `0.0.0.0:8080`).
    pub fn new(bind_addr: &str, handler: CommandHandler) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket, handler })
    }

    /// Address the receiver is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking accept loop; serves one command per connection.
    pub fn receive_loop(self) -> Result<()> {
        info!("Command TCP server is started on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.serve(stream) {
                        warn!("Command connection failed: {}", e);
                    }
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }

    fn serve(&self, mut stream: TcpStream) -> Result<()> {
        let peer = stream.peer_addr()?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut line = Vec::new();
        BufReader::new((&stream).take(MAX_COMMAND_BYTES)).read_until(b'\n', &mut line)?;

        let reply = match Command::from_json_slice(&line) {
            Ok(cmd) => {
                info!("Received {} from {}", cmd.kind, peer);
                self.handler.handle(&cmd, peer)
            }
            Err(e) => {
                warn!("Malformed command from {}: {}", peer, e);
                Reply::error(&e)
            }
        };

        let mut payload = reply.to_json_bytes()?;
        payload.push(b'\n');
        stream.write_all(&payload)?;
        Ok(())
    }
}
