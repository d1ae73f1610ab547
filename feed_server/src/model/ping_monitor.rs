//! Keep-alive tracker for streaming clients.
//!
//! Streaming is UDP, so the server cannot see a client go away. Clients send a
//! `PING` datagram every couple of seconds from the socket that receives their
//! stream; the monitor records the last ping per address and reports the
//! addresses that have been silent for longer than the timeout:
//!
//! - `PingMonitor::register(addr)`: start tracking a freshly subscribed client.
//! - `PingMonitor::update_ping(addr)`: record a ping; unknown addresses are ignored.
//! - `PingMonitor::check_timeouts()`: remove and return every silent client.
//! - `PingMonitor::forget(addr)`: stop tracking a client whose session ended.
//!
//! Time is measured with the monotonic `Instant`. The monitor itself is not
//! synchronized; the server shares it behind a mutex.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Tracks client keep-alive pings and determines inactivity based on a timeout.
#[derive(Debug)]
pub struct PingMonitor {
    last_ping: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl PingMonitor {
    /// Create a monitor that times clients out after `timeout` of silence.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_ping: HashMap::new(),
            timeout,
        }
    }

    /// Start tracking `addr` as if it had just pinged.
    pub fn register(&mut self, addr: SocketAddr) {
        self.register_at(addr, Instant::now());
    }

    fn register_at(&mut self, addr: SocketAddr, now: Instant) {
        self.last_ping.insert(addr, now);
    }

    /// Record a ping from `addr`. Returns `false` if `addr` has no stream.
    pub fn update_ping(&mut self, addr: SocketAddr) -> bool {
        match self.last_ping.get_mut(&addr) {
            Some(last) => {
                *last = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove and return every client silent for longer than the timeout.
    ///
    /// A timed-out client is reported once; it is tracked again only after a new
    /// `register`.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        self.check_timeouts_at(Instant::now())
    }

    fn check_timeouts_at(&mut self, now: Instant) -> Vec<SocketAddr> {
        let timeout = self.timeout;
        let mut timed_out = Vec::new();
        self.last_ping.retain(|addr, last| {
            if now.saturating_duration_since(*last) > timeout {
                timed_out.push(*addr);
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// Stop tracking `addr`.
    pub fn forget(&mut self, addr: &SocketAddr) {
        self.last_ping.remove(addr);
    }
}
