//! Readiness reactor: accept, handshake, per-peer reads.
//!
//! Single-threaded. Each tick waits on epoll with a bounded timeout so the
//! exit flag is observed promptly, then handles readiness: the listener
//! accepts one peer per event (level-triggered), peers are drained to
//! `WouldBlock` (edge-triggered), and every successful read becomes one
//! owned [`InboundTask`]. A full inbound queue drops the read on the floor
//! and the peer stays connected; that drop is the pipeline's backpressure
//! point.

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use relayd_wire::{handshake, serialize_into};

use crate::net;
use crate::poll::{Event, Poller};
use crate::queue::BoundedQueue;
use crate::server::Shared;
use crate::task::{InboundTask, PeerId};

pub(crate) struct Reactor<'a> {
    shared: &'a Shared,
    inbound: &'a BoundedQueue<InboundTask>,
    poller: &'a Poller,
    listener: &'a TcpListener,
    max_events: usize,
    /// Read-side handles, keyed by the registered descriptor. The roster
    /// holds the write-side duplicates.
    conns: HashMap<RawFd, TcpStream>,
    handshake_buf: BytesMut,
}

impl<'a> Reactor<'a> {
    pub(crate) fn new(
        shared: &'a Shared,
        inbound: &'a BoundedQueue<InboundTask>,
        poller: &'a Poller,
        listener: &'a TcpListener,
        max_events: usize,
    ) -> Self {
        Reactor {
            shared,
            inbound,
            poller,
            listener,
            max_events,
            conns: HashMap::new(),
            handshake_buf: BytesMut::new(),
        }
    }

    pub(crate) fn run(&mut self, exit_flag: &AtomicBool, poll_timeout_ms: i32) -> io::Result<()> {
        let listen_fd = self.listener.as_raw_fd();
        let mut events: Vec<Event> = Vec::with_capacity(self.max_events);

        loop {
            if !self.shared.running.load(Ordering::SeqCst) || exit_flag.load(Ordering::SeqCst) {
                break;
            }

            self.poller.wait(&mut events, poll_timeout_ms)?;

            for index in 0..events.len() {
                let fd = events[index].u64 as RawFd;
                if fd == listen_fd {
                    self.accept_peer();
                } else {
                    self.peer_ready(fd);
                }
            }
        }

        Ok(())
    }

    /// Accept one peer: non-blocking, edge-triggered registration, roster
    /// insert, then the handshake frame advertising the data strategy.
    fn accept_peer(&mut self) {
        let (stream, addr) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        };

        if let Err(e) = self.setup_peer(stream, addr) {
            warn!(%addr, error = %e, "dropping peer during setup");
        }
    }

    fn setup_peer(&mut self, stream: TcpStream, addr: std::net::SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(true)?;

        let fd = stream.as_raw_fd();
        let peer = PeerId(fd);
        let write_side = stream.try_clone()?;

        self.poller.register(fd, true)?;
        self.conns.insert(fd, stream);
        self.shared.roster.add(peer, write_side);

        if let Err(e) = self.write_handshake(peer) {
            self.disconnect(fd);
            return Err(e);
        }

        self.shared.stats.record_accept();
        info!(%peer, %addr, "peer connected");
        Ok(())
    }

    /// The handshake is framed like any data packet but always with the
    /// no-op transform: the peer has nothing negotiated yet and parses the
    /// first frame in plaintext.
    fn write_handshake(&mut self, peer: PeerId) -> io::Result<()> {
        let body = handshake::encode_strategy(self.shared.advertise);
        serialize_into(
            &mut self.handshake_buf,
            &handshake::HANDSHAKE_TARGET,
            &body,
            None,
            self.shared.frame_capacity,
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let buf = &self.handshake_buf;
        self.shared
            .roster
            .with_peer(peer, |stream| net::write_frame(stream, buf))
            .unwrap_or_else(|| Err(io::ErrorKind::NotConnected.into()))
    }

    /// Drain a ready peer. One task per successful read; EOF or a hard
    /// error closes the peer.
    fn peer_ready(&mut self, fd: RawFd) {
        let Some(stream) = self.conns.get(&fd) else {
            return;
        };
        let peer = PeerId(fd);
        let mut reader: &TcpStream = stream;
        let mut closed = false;

        loop {
            let mut data = vec![0u8; self.shared.frame_capacity];
            match reader.read(&mut data) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    data.truncate(n);
                    if self
                        .inbound
                        .try_enqueue(InboundTask::Frame { peer, data })
                        .is_err()
                    {
                        // Backpressure: the read is dropped, the peer stays.
                        self.shared.stats.record_inbound_drop();
                        warn!(%peer, "inbound queue full, dropping read");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(%peer, error = %e, "read failed");
                    closed = true;
                    break;
                }
            }
        }

        if closed {
            self.disconnect(fd);
        }
    }

    fn disconnect(&mut self, fd: RawFd) {
        if let Err(e) = self.poller.deregister(fd) {
            debug!(fd, error = %e, "epoll deregister failed");
        }
        self.conns.remove(&fd);

        let peer = PeerId(fd);
        if self.shared.roster.remove(peer).is_some() {
            self.shared.stats.record_disconnect();
            info!(%peer, "peer disconnected");
        }
    }
}
