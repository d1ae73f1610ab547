//! Shared networking constants and helpers used by client and server.

/// TCP port for the command channel (client -> server).
pub const COMMAND_PORT: u16 = 8080;
/// UDP port for price streaming and pings (server <-> client).
pub const DATA_PORT: u16 = 8081;
/// Keep-alive datagram payload sent by clients to `DATA_PORT`.
pub const PING_PAYLOAD: &[u8] = b"PING";

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ip_and_port() {
        assert_eq!(addr("127.0.0.1", COMMAND_PORT), "127.0.0.1:8080");
    }
}
