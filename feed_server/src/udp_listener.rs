//! UDP keep-alive listener for streaming clients.

use crate::model::ping_monitor::PingMonitor;
use feed_common::net::PING_PAYLOAD;
use feed_common::Result;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Lightweight UDP listener that receives PING datagrams from streaming clients
/// and refreshes their entry in the shared `PingMonitor`.
pub struct UdpPingListener;

impl UdpPingListener {
    /// Spawn a background thread that reads datagrams from `socket` and, for every
    /// `PING`, updates `ping_monitor` for the sender.
    pub fn start(
        socket: Arc<UdpSocket>,
        ping_monitor: Arc<Mutex<PingMonitor>>,
    ) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("ping-listener".to_string())
            .spawn(move || {
                let mut buf = [0u8; 128];
                loop {
                    match socket.recv_from(&mut buf) {
                        Ok((size, addr)) if buf[..size].starts_with(PING_PAYLOAD) => {
                            if ping_monitor.lock().update_ping(addr) {
                                trace!("Received ping from {}", addr);
                            } else {
                                debug!("Ping from {} without an active stream", addr);
                            }
                        }
                        Ok((size, addr)) => debug!("Ignored {} byte datagram from {}", size, addr),
                        // e.g. ICMP port unreachable surfacing as a reset on some platforms
                        Err(e) => warn!("UDP receive error: {}", e),
                    }
                }
            })?;
        Ok(handle)
    }
}
