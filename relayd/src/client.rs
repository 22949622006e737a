//! Reconnecting framed-message client.
//!
//! One background manager thread owns the connection lifecycle:
//!
//! ```text
//! Disconnected --connect ok--> Handshaking --SEC_ARG ok--> Connected
//!      ^   ^                       |                           |
//!      |   +--connect failed,      +--any handshake fault      +--read/parse fault
//!      |      sleep, retry            (close, sleep, retry)       (reset, retry now)
//!      +-- disconnect() from any state (shutdown wakes the blocked read)
//! ```
//!
//! The socket is published to `send` callers only after the negotiated
//! strategy has been applied, so `is_connected` implies the handshake is
//! complete. A reset closes the socket and restores the plaintext pair so
//! the next handshake parses in plaintext.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tracing::{debug, info, warn};

use relayd_wire::{
    frame_len_from_header, handshake, parse, serialize_into, CipherFn, CipherPair, StrategyCode,
    TargetTag, WireError, HEADER_LEN,
};

use crate::config::ClientConfig;
use crate::stats::{PipelineStats, StatsSnapshot};

/// Message callback invoked by the manager thread for every parsed frame.
/// The body borrow is valid only until the callback returns.
pub type OnClientMessage = dyn Fn(&ClientHandle, &TargetTag, &[u8]) + Send + Sync;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No established, handshaken connection right now.
    #[error("client is not connected")]
    NotConnected,

    /// The handshake frame was malformed or mis-targeted.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Codec failure while framing or parsing.
    #[error(transparent)]
    Frame(#[from] WireError),

    /// Socket failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

struct ClientShared {
    running: AtomicBool,
    /// Write-side handle, `Some` only between a completed handshake and
    /// the next reset.
    conn: Mutex<Option<TcpStream>>,
    strategy: Mutex<CipherPair>,
    stats: PipelineStats,
    frame_capacity: usize,
}

impl ClientShared {
    fn current_strategy(&self) -> CipherPair {
        *self.strategy.lock().expect("strategy mutex poisoned")
    }

    fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.conn.lock().expect("conn mutex poisoned").is_some()
    }

    /// Close the connection and restore the plaintext pair.
    fn reset_connection(&self) {
        let mut conn = self.conn.lock().expect("conn mutex poisoned");
        if conn.take().is_some() {
            self.stats.record_disconnect();
        }
        *self.strategy.lock().expect("strategy mutex poisoned") = CipherPair::PLAINTEXT;
    }

    fn send(&self, target: &TargetTag, body: &[u8]) -> Result<usize, ClientError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let guard = self.conn.lock().expect("conn mutex poisoned");
        let Some(stream) = guard.as_ref() else {
            return Err(ClientError::NotConnected);
        };

        let encrypt = self.current_strategy().encrypt;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len() + 1);
        let total = serialize_into(&mut buf, target, body, encrypt, self.frame_capacity)?;

        // Writing under the connection lock serializes concurrent senders
        // so frames cannot interleave on the wire.
        let mut writer: &TcpStream = stream;
        writer.write_all(&buf)?;

        self.stats.record_frame_out();
        Ok(total)
    }
}

/// A framed-message TCP client with background reconnect.
pub struct Client {
    shared: Arc<ClientShared>,
    manager: Option<JoinHandle<()>>,
}

impl Client {
    /// Start the manager thread targeting `addr` (`host:port`; resolution
    /// happens on every attempt). Returns immediately; poll
    /// [`Client::is_connected`] for the handshake to complete.
    pub fn connect<F>(config: ClientConfig, addr: &str, handler: F) -> Result<Client, ClientError>
    where
        F: Fn(&ClientHandle, &TargetTag, &[u8]) + Send + Sync + 'static,
    {
        config.validate().map_err(ClientError::Config)?;

        let shared = Arc::new(ClientShared {
            running: AtomicBool::new(true),
            conn: Mutex::new(None),
            strategy: Mutex::new(CipherPair::PLAINTEXT),
            stats: PipelineStats::default(),
            frame_capacity: config.frame_capacity,
        });

        let manager = {
            let shared = Arc::clone(&shared);
            let addr = addr.to_string();
            let handler: Arc<OnClientMessage> = Arc::new(handler);
            thread::Builder::new()
                .name("relayd-client".to_string())
                .spawn(move || manager_loop(shared, addr, config, handler))?
        };

        Ok(Client {
            shared,
            manager: Some(manager),
        })
    }

    /// True once a connection is established and its handshake applied.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Frame and write `body` on the current connection, returning the
    /// frame length written.
    pub fn send(&self, target: &TargetTag, body: &[u8]) -> Result<usize, ClientError> {
        self.shared.send(target, body)
    }

    /// Swap the data-path cipher pair. Advisory mid-session; the peer must
    /// swap at the same logical moment.
    pub fn set_strategy(&self, encrypt: Option<CipherFn>, decrypt: Option<CipherFn>) {
        *self
            .shared
            .strategy
            .lock()
            .expect("strategy mutex poisoned") = CipherPair { encrypt, decrypt };
    }

    /// Pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop the manager thread and close the connection. The shutdown on
    /// the socket wakes a read blocked in the manager.
    pub fn disconnect(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        {
            let conn = self.shared.conn.lock().expect("conn mutex poisoned");
            if let Some(stream) = conn.as_ref() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(thread) = self.manager.take() {
            if thread.join().is_err() {
                debug!("client manager panicked before join");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Callback-side capability: lets a handler reply or inspect connection
/// state without holding the whole [`Client`].
#[derive(Clone)]
pub struct ClientHandle {
    shared: Arc<ClientShared>,
}

impl ClientHandle {
    pub fn send(&self, target: &TargetTag, body: &[u8]) -> Result<usize, ClientError> {
        self.shared.send(target, body)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }
}

fn manager_loop(
    shared: Arc<ClientShared>,
    addr: String,
    config: ClientConfig,
    handler: Arc<OnClientMessage>,
) {
    let handle = ClientHandle {
        shared: Arc::clone(&shared),
    };
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);
    let mut buf = vec![0u8; config.frame_capacity];
    let mut sessions: u64 = 0;

    while shared.running.load(Ordering::SeqCst) {
        // Disconnected → Handshaking.
        let stream = match TcpStream::connect(addr.as_str()) {
            Ok(stream) => stream,
            Err(e) => {
                debug!(%addr, error = %e, "connect failed, retrying");
                thread::sleep(reconnect_delay);
                continue;
            }
        };

        // Handshaking → Connected, or back to Disconnected.
        match perform_handshake(&shared, &stream, &mut buf) {
            Ok(code) => {
                let published = match stream.try_clone() {
                    Ok(dup) => dup,
                    Err(e) => {
                        warn!(error = %e, "could not retain connection handle");
                        thread::sleep(reconnect_delay);
                        continue;
                    }
                };
                *shared.conn.lock().expect("conn mutex poisoned") = Some(published);
                shared.stats.record_accept();
                if sessions > 0 {
                    shared.stats.record_reconnect();
                }
                sessions += 1;
                info!(%addr, strategy = ?code, "connected");
            }
            Err(e) => {
                debug!(%addr, error = %e, "handshake failed, retrying");
                drop(stream);
                thread::sleep(reconnect_delay);
                continue;
            }
        }

        // Connected: blocking receive loop.
        while shared.running.load(Ordering::SeqCst) {
            let total = match read_frame(&stream, &mut buf, shared.frame_capacity) {
                Ok(total) => total,
                Err(e) => {
                    debug!(error = %e, "connection lost");
                    break;
                }
            };

            let decrypt = shared.current_strategy().decrypt;
            match parse(&mut buf[..total], decrypt) {
                Ok(frame) => {
                    shared.stats.record_frame_in();
                    handler(&handle, &frame.target, frame.body);
                }
                Err(e) => {
                    // A framing fault desynchronizes the stream; the only
                    // safe recovery is a fresh connection.
                    shared.stats.record_parse_failure();
                    warn!(error = %e, "frame rejected, resetting connection");
                    break;
                }
            }
        }

        shared.reset_connection();
    }

    shared.reset_connection();
    debug!("client manager exiting");
}

/// Read one framed packet with a plaintext parse and apply the advertised
/// strategy. Any deviation fails the handshake.
fn perform_handshake(
    shared: &ClientShared,
    stream: &TcpStream,
    buf: &mut [u8],
) -> Result<StrategyCode, ClientError> {
    let total = read_frame(stream, buf, shared.frame_capacity)?;
    let frame = parse(&mut buf[..total], None)?;

    if frame.target != handshake::HANDSHAKE_TARGET {
        return Err(ClientError::Handshake(format!(
            "unexpected first-frame target {}",
            frame.target
        )));
    }

    let code = handshake::decode_strategy(frame.body)?;
    *shared.strategy.lock().expect("strategy mutex poisoned") = CipherPair::for_code(code);
    Ok(code)
}

/// Read exactly one frame: the fixed header, then the remainder the header
/// claims. A claimed length outside `[13, capacity]` is a protocol fault
/// and the caller closes the connection.
fn read_frame(stream: &TcpStream, buf: &mut [u8], capacity: usize) -> Result<usize, ClientError> {
    use std::io::Read;

    let mut reader: &TcpStream = stream;
    reader.read_exact(&mut buf[..HEADER_LEN])?;

    let total = frame_len_from_header(&buf[..HEADER_LEN])?;
    if total > capacity {
        return Err(ClientError::Frame(WireError::FrameTooLarge {
            total,
            capacity,
        }));
    }

    reader.read_exact(&mut buf[HEADER_LEN..total])?;
    Ok(total)
}
