//! Sending commands to the price feed server.
//!
//! Commands travel over a short-lived TCP connection (one JSON line out, one JSON
//! line back). Keep-alive `PING`s for an open stream travel over UDP from the
//! socket that receives the stream, so the server can match them to it.
use feed_common::net::PING_PAYLOAD;
use feed_common::{Command, Reply, Result};
use log::{debug, error, info};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

/// PING interval in milliseconds used by the background thread.
const INTERVAL_MS: u64 = 2000;
/// How long to wait for the server's reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper type for sending commands to the server.
pub struct CommandSender;

impl CommandSender {
    /// Connect to `server_addr`, send `command` and wait for the reply.
    pub fn request(server_addr: &str, command: &Command) -> Result<Reply> {
        let mut stream = TcpStream::connect(server_addr)?;
        stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
        Self::send_command(&mut stream, command)?;

        let mut line = Vec::new();
        BufReader::new(&stream).read_until(b'\n', &mut line)?;
        Reply::from_json_slice(&line)
    }

    /// Write `command` as one JSON line.
    pub fn send_command(stream: &mut TcpStream, command: &Command) -> Result<()> {
        let mut payload = command.to_json_bytes()?;
        payload.push(b'\n');

        info!(
            "Sending {} udp://{}:{} [{}]",
            command.kind,
            command.address,
            command.port,
            command.symbols.join(",")
        );
        stream.write_all(&payload)?;
        Ok(())
    }

    /// Send a `PING` datagram to `target_addr` every couple of seconds until `shutdown`.
    pub fn start_ping_thread(socket: Arc<UdpSocket>, target_addr: String, shutdown: Arc<AtomicBool>) {
        info!("Ping thread started. Target: {}", target_addr);
        thread::spawn(move || {
            let interval = Duration::from_millis(INTERVAL_MS);
            while !shutdown.load(Ordering::Relaxed) {
                match socket.send_to(PING_PAYLOAD, &target_addr) {
                    Ok(_) => debug!("PING sent to {}", target_addr),
                    Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {}
                    Err(e) => error!("Failed to send PING: {}", e),
                }
                thread::sleep(interval);
            }
            info!("Ping thread stopping...");
        });
    }
}
