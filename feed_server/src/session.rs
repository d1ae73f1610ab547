//! Streaming sessions: one hub subscription and one stream thread per client.
//!
//! A session starts when the command channel accepts a `SUBSCRIBE` and ends when
//! the client stops pinging, the stream thread fails to send, or the same
//! address subscribes again. Every path out of a session goes through
//! `SessionTable::close`, which unsubscribes from the hub exactly once and stops
//! the stream thread.
//!
//! `SessionTable::run` is the server's control loop: it owns the table and
//! multiplexes subscribe requests, keep-alive timeouts, self-terminated streams
//! and mutator faults. Losing any of those channels ends the loop with an error.
//!
//! The stream thread first sends the current price of every selected instrument
//! as a zero-delta update, then forwards queued updates one JSON datagram each.
//! The snapshot and the subscription are not reconciled: the first live tick may
//! duplicate a snapshot price or arrive just before the snapshot is taken.

use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvError, Sender, bounded, select};
use feed_common::{FeedError, PriceUpdate, Result};
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::model::hub::{BroadcastHub, SubscriberId};
use crate::model::ping_monitor::PingMonitor;
use crate::model::registry::InstrumentRegistry;

/// Symbols a client asked for; empty means every instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFilter(HashSet<String>);

impl SymbolFilter {
    /// Filter accepting only `symbols`, or everything if `symbols` is empty.
    pub fn new<I: IntoIterator<Item = String>>(symbols: I) -> Self {
        Self(symbols.into_iter().collect())
    }

    /// Whether updates for `symbol` should be forwarded.
    pub fn accepts(&self, symbol: &str) -> bool {
        self.0.is_empty() || self.0.contains(symbol)
    }
}

/// Request from the command channel to open a stream.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    /// Client UDP address the stream is sent to.
    pub target: SocketAddr,
    /// Symbols the client wants.
    pub filter: SymbolFilter,
}

/// Notice from a stream thread that ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEnded {
    /// Client address of the ended stream.
    pub target: SocketAddr,
    /// Subscription the stream was draining.
    pub subscriber: SubscriberId,
}

/// Stream task for a single client.
///
/// Sends the snapshot, then forwards queued updates that pass `filter` to
/// `target` until `stop_rx` fires, the queue is closed by an unsubscribe, or a
/// send fails.
pub fn handle_client_stream(
    socket: &UdpSocket,
    target: SocketAddr,
    filter: &SymbolFilter,
    snapshot: Vec<PriceUpdate>,
    data_rx: Receiver<PriceUpdate>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    for update in snapshot.iter().filter(|u| filter.accepts(&u.symbol)) {
        socket.send_to(&update.to_json_bytes()?, target)?;
    }

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(data_rx) -> msg => match msg {
                Ok(update) => {
                    if filter.accepts(&update.symbol) {
                        socket.send_to(&update.to_json_bytes()?, target)?;
                    }
                },
                // unsubscribed: the hub dropped our queue
                Err(_) => break,
            }
        }
    }
    Ok(())
}

/// Inputs of the session control loop.
pub struct SessionEvents {
    /// Accepted `SUBSCRIBE` requests from the command channel.
    pub subscribe_rx: Receiver<SubscribeRequest>,
    /// Clients reported silent by the ping checker.
    pub timeout_rx: Receiver<SocketAddr>,
    /// Stream threads that ended on their own.
    pub ended_rx: Receiver<StreamEnded>,
    /// Fatal errors from the price mutator.
    pub fault_rx: Receiver<FeedError>,
}

fn lost(source: &str, e: RecvError) -> FeedError {
    FeedError::ChannelRecv(format!("{} channel closed: {}", source, e))
}

struct ActiveSession {
    subscriber: SubscriberId,
    stop_tx: Sender<()>,
}

/// Live sessions keyed by client UDP address.
pub struct SessionTable {
    hub: Arc<BroadcastHub>,
    registry: Arc<InstrumentRegistry>,
    socket: Arc<UdpSocket>,
    ended_tx: Sender<StreamEnded>,
    sessions: HashMap<SocketAddr, ActiveSession>,
}

impl SessionTable {
    /// Create an empty table. Stream threads that end on their own report on `ended_tx`.
    pub fn new(
        hub: Arc<BroadcastHub>,
        registry: Arc<InstrumentRegistry>,
        socket: Arc<UdpSocket>,
        ended_tx: Sender<StreamEnded>,
    ) -> Self {
        Self {
            hub,
            registry,
            socket,
            ended_tx,
            sessions: HashMap::new(),
        }
    }

    /// Subscribe and spawn a stream thread for `request.target`.
    ///
    /// An existing session for the same address is closed first.
    pub fn open(&mut self, request: SubscribeRequest) -> Result<SubscriberId> {
        let SubscribeRequest { target, filter } = request;
        self.close(&target);

        let subscription = self.hub.subscribe();
        let subscriber = subscription.id;
        let snapshot = self
            .registry
            .snapshot()
            .iter()
            .map(PriceUpdate::from_instrument)
            .collect();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let socket = Arc::clone(&self.socket);
        let ended_tx = self.ended_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("stream-{}", target))
            .spawn(move || {
                if let Err(e) = handle_client_stream(
                    &socket,
                    target,
                    &filter,
                    snapshot,
                    subscription.receiver,
                    stop_rx,
                ) {
                    error!("Client stream to {} failed: {}", target, e);
                }
                // the table ignores this if it already closed the session
                let _ = ended_tx.send(StreamEnded { target, subscriber });
            });
        if let Err(e) = spawned {
            self.hub.unsubscribe(subscriber);
            return Err(e.into());
        }

        self.sessions
            .insert(target, ActiveSession { subscriber, stop_tx });
        info!(
            "Stream {} opened for {}. Active streams: {}",
            subscriber,
            target,
            self.sessions.len()
        );
        Ok(subscriber)
    }

    /// Close the session for `target`, if any.
    pub fn close(&mut self, target: &SocketAddr) -> bool {
        match self.sessions.remove(target) {
            Some(session) => {
                self.finish(target, session);
                true
            }
            None => false,
        }
    }

    /// Close the session for `ended.target` only if it is still the one that ended.
    ///
    /// A replaced session's late notice must not close its successor.
    pub fn close_ended(&mut self, ended: StreamEnded) -> bool {
        match self.sessions.get(&ended.target) {
            Some(session) if session.subscriber == ended.subscriber => {
                warn!("Stream for {} ended on its own", ended.target);
                self.close(&ended.target)
            }
            _ => false,
        }
    }

    /// Close every session.
    pub fn close_all(&mut self) {
        let targets: Vec<SocketAddr> = self.sessions.keys().copied().collect();
        for target in targets {
            self.close(&target);
        }
    }

    fn finish(&self, target: &SocketAddr, session: ActiveSession) {
        self.hub.unsubscribe(session.subscriber);
        // the stream may already be gone
        let _ = session.stop_tx.try_send(());
        info!(
            "Stream {} for {} closed. Active streams: {}",
            session.subscriber,
            target,
            self.sessions.len()
        );
    }

    /// Serve `events` until a mutator fault arrives or an input channel closes.
    ///
    /// Opened sessions are registered with `ping_monitor`; sessions ended by a
    /// timeout or by their own stream are closed here. Every session is closed
    /// before the error is returned.
    pub fn run(&mut self, ping_monitor: &Mutex<PingMonitor>, events: &SessionEvents) -> Result<()> {
        let err = loop {
            select! {
                recv(events.subscribe_rx) -> msg => match msg {
                    Ok(request) => {
                        let target = request.target;
                        match self.open(request) {
                            Ok(_) => ping_monitor.lock().register(target),
                            Err(e) => error!("Failed to open stream for {}: {}", target, e),
                        }
                    }
                    Err(e) => break lost("subscribe", e),
                },
                recv(events.timeout_rx) -> msg => match msg {
                    Ok(target) => {
                        if self.close(&target) {
                            info!("Stream for {} closed: ping timeout", target);
                        }
                    }
                    Err(e) => break lost("ping timeout", e),
                },
                recv(events.ended_rx) -> msg => match msg {
                    Ok(ended) => {
                        if self.close_ended(ended) {
                            ping_monitor.lock().forget(&ended.target);
                        }
                    }
                    Err(e) => break lost("stream ended", e),
                },
                recv(events.fault_rx) -> msg => {
                    break msg.unwrap_or_else(|e| lost("mutator fault", e));
                },
            }
        };
        error!("Session loop stopping: {}", err);
        self.close_all();
        Err(err)
    }

    /// Whether `target` has a live session.
    pub fn contains(&self, target: &SocketAddr) -> bool {
        self.sessions.contains_key(target)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
