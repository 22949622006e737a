//! Full-pipeline integration tests: a real server and client exchanging
//! frames over loopback TCP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use relayd::{Client, ClientConfig, PeerId, QueueConfig, Server, ServerConfig, ServerHandle};
use relayd_wire::TargetTag;

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn local_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

fn fast_client_config() -> ClientConfig {
    ClientConfig {
        reconnect_delay_ms: 100,
        ..ClientConfig::default()
    }
}

/// A server running its reactor on a background thread, torn down on
/// `stop`.
struct RunningServer {
    exit: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    handle: ServerHandle,
    addr: SocketAddr,
}

impl RunningServer {
    fn start<F>(config: ServerConfig, handler: F) -> Self
    where
        F: Fn(&ServerHandle, PeerId, &TargetTag, &[u8]) + Send + Sync + 'static,
    {
        let mut server = Server::bind(config, handler).expect("bind failed");
        let handle = server.handle();
        let addr = server.local_addr().expect("no local addr");
        let exit = Arc::new(AtomicBool::new(false));

        let thread = {
            let exit = Arc::clone(&exit);
            thread::spawn(move || {
                server.run(&exit).expect("server run failed");
                server.shutdown();
            })
        };

        RunningServer {
            exit,
            thread: Some(thread),
            handle,
            addr,
        }
    }

    fn stop(mut self) {
        self.exit.store(true, Ordering::SeqCst);
        self.thread
            .take()
            .expect("already stopped")
            .join()
            .expect("server thread panicked");
    }
}

type Seen = (String, Vec<u8>);

fn recording_client(addr: &SocketAddr, config: ClientConfig) -> (Client, Receiver<Seen>) {
    let (tx, rx): (Sender<Seen>, Receiver<Seen>) = unbounded();
    let client = Client::connect(config, &addr.to_string(), move |_handle, target, body| {
        let _ = tx.send((target.name(), body.to_vec()));
    })
    .expect("client connect failed");
    (client, rx)
}

#[test]
fn end_to_end_exchange_with_unicast_and_broadcast() {
    let (seen_tx, seen_rx) = unbounded::<(PeerId, Seen)>();

    let server = RunningServer::start(local_config(), move |handle, peer, target, body| {
        let _ = seen_tx.send((peer, (target.name(), body.to_vec())));
        if *target == TargetTag::new("PING") {
            handle
                .send(peer, &TargetTag::new("ACK"), b"ok")
                .expect("unicast submit failed");
            handle
                .broadcast(&TargetTag::new("PONG"), b"xy")
                .expect("broadcast submit failed");
        }
    });

    let (mut client, client_rx) = recording_client(&server.addr, fast_client_config());
    assert!(
        wait_until(Duration::from_secs(5), || client.is_connected()),
        "client never completed the handshake"
    );
    assert_eq!(server.handle.client_count(), 1);

    client
        .send(&TargetTag::new("PING"), b"ab")
        .expect("client send failed");

    let (_peer, (target, body)) = seen_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("server never saw the frame");
    assert_eq!(target, "PING");
    assert_eq!(body, b"ab");

    // Outbound FIFO: the unicast ACK was queued before the broadcast PONG.
    let (target, body) = client_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("client never saw the ACK");
    assert_eq!(target, "ACK");
    assert_eq!(body, b"ok");

    let (target, body) = client_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("client never saw the PONG");
    assert_eq!(target, "PONG");
    assert_eq!(body, b"xy");

    let stats = server.handle.stats();
    assert!(stats.frames_in >= 1);
    assert!(stats.frames_out >= 2);
    assert_eq!(stats.parse_failures, 0);

    client.disconnect();
    server.stop();
}

#[test]
fn inbound_backpressure_drops_instead_of_blocking() {
    // One worker, wedged in the handler until released; inbound capacity
    // of two. Everything past head-of-line + queue capacity is dropped by
    // the reactor.
    let (release_tx, release_rx) = unbounded::<()>();

    let mut config = local_config();
    config.queue = QueueConfig {
        inbound_capacity: 2,
        outbound_capacity: 100,
    };

    let server = RunningServer::start(config, move |_handle, _peer, _target, _body| {
        let _ = release_rx.recv_timeout(Duration::from_secs(10));
    });

    let (mut client, _client_rx) = recording_client(&server.addr, fast_client_config());
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    for _ in 0..6 {
        client
            .send(&TargetTag::new("FLOOD"), b"payload")
            .expect("client send failed");
        // Keep frames in distinct reads; the reactor treats each read as
        // one task.
        thread::sleep(Duration::from_millis(30));
    }

    assert!(
        wait_until(Duration::from_secs(5), || {
            server.handle.stats().inbound_dropped >= 1
        }),
        "no inbound drop recorded: {:?}",
        server.handle.stats()
    );

    // The wedged peer stays connected through the drops.
    assert!(client.is_connected());
    assert_eq!(server.handle.client_count(), 1);

    for _ in 0..10 {
        let _ = release_tx.send(());
    }
    client.disconnect();
    server.stop();
}

#[test]
fn graceful_shutdown_joins_all_stages() {
    let server = RunningServer::start(local_config(), |_handle, _peer, _target, _body| {});
    let handle = server.handle.clone();

    let (mut client, _client_rx) = recording_client(&server.addr, fast_client_config());
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    client
        .send(&TargetTag::new("LAST"), b"bye")
        .expect("client send failed");

    // stop() only returns once the reactor exited and every worker and
    // the sender joined.
    server.stop();
    assert!(!handle.is_running());

    // Submissions after shutdown are refused, not queued.
    assert!(handle.broadcast(&TargetTag::new("X"), b"y").is_err());

    // The client notices the closed socket and reverts to reconnecting.
    assert!(wait_until(Duration::from_secs(5), || !client.is_connected()));
    client.disconnect();
}

#[test]
fn client_reconnects_and_rehandshakes_after_server_restart() {
    let first = RunningServer::start(local_config(), |_h, _p, _t, _b| {});
    let port = first.addr.port();

    let (mut client, _client_rx) = recording_client(&first.addr, fast_client_config());
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    first.stop();
    assert!(
        wait_until(Duration::from_secs(5), || !client.is_connected()),
        "client did not notice the dead server"
    );

    // Same port, fresh server; the manager must reconnect and redo the
    // handshake on its own.
    let (seen_tx, seen_rx) = unbounded::<Seen>();
    let mut config = local_config();
    config.port = port;
    let second = RunningServer::start(config, move |_handle, _peer, target, body| {
        let _ = seen_tx.send((target.name(), body.to_vec()));
    });

    assert!(
        wait_until(Duration::from_secs(10), || client.is_connected()),
        "client never reconnected"
    );
    assert!(client.stats().reconnects >= 1);

    client
        .send(&TargetTag::new("AGAIN"), b"back")
        .expect("post-reconnect send failed");

    let (target, body) = seen_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("reconnected frame never arrived");
    assert_eq!(target, "AGAIN");
    assert_eq!(body, b"back");

    client.disconnect();
    second.stop();
}

#[test]
fn send_without_connection_is_refused() {
    // Nothing listens on this address; the manager keeps retrying in the
    // background while send fails fast.
    let (mut client, _rx) = recording_client(
        &"127.0.0.1:1".parse().unwrap(),
        fast_client_config(),
    );

    assert!(!client.is_connected());
    assert!(client.send(&TargetTag::new("NOPE"), b"x").is_err());
    client.disconnect();
}
