use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use feed_common::{Command, Reply};
use feed_server::InstrumentRegistry;
use feed_server::receiver::{CommandHandler, CommandReceiver};
use feed_server::session::SubscribeRequest;

fn start_server() -> (SocketAddr, Receiver<SubscribeRequest>) {
    let (tx, rx) = unbounded();
    let handler = CommandHandler::new(Arc::new(InstrumentRegistry::with_defaults()), tx);
    let receiver = CommandReceiver::new("127.0.0.1:0", handler).unwrap();
    let addr = receiver.local_addr().unwrap();
    thread::spawn(move || receiver.receive_loop());
    (addr, rx)
}

fn exchange(addr: SocketAddr, payload: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(payload).unwrap();
    stream.write_all(b"\n").unwrap();
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).unwrap();
    Reply::from_json_slice(line.trim_end().as_bytes()).unwrap()
}

#[test]
fn serves_prices_lookup_and_subscribe_over_tcp() {
    let (addr, subscriptions) = start_server();

    match exchange(addr, &Command::prices().to_json_bytes().unwrap()) {
        Reply::Prices { instruments, .. } => assert_eq!(instruments.len(), 5),
        other => panic!("unexpected reply {other:?}"),
    }

    assert!(matches!(
        exchange(addr, &Command::lookup("ZZZZ").to_json_bytes().unwrap()),
        Reply::Error { .. }
    ));

    let subscribe = Command::subscribe("0.0.0.0", 45678, vec!["AAPL".into()]);
    assert_eq!(
        exchange(addr, &subscribe.to_json_bytes().unwrap()),
        Reply::Subscribed {
            address: "127.0.0.1:45678".into()
        }
    );
    let request = subscriptions.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(request.target, "127.0.0.1:45678".parse().unwrap());
}

#[test]
fn malformed_command_does_not_stop_the_receiver() {
    let (addr, _subscriptions) = start_server();

    assert!(matches!(exchange(addr, b"{not json"), Reply::Error { .. }));
    assert!(matches!(
        exchange(addr, br#"{"kind":"J_QUOTE"}"#),
        Reply::Error { .. }
    ));
    assert_eq!(exchange(addr, br#"{"kind":"ping"}"#), Reply::Pong);
}
