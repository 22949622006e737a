//! Server lifecycle and embedding surface.
//!
//! A [`Server`] moves through bind → run → shutdown. `bind` claims the
//! port and the epoll instance, `run` spawns the worker and sender stages
//! and then drives the reactor on the calling thread until the exit flag
//! is observed, and `shutdown` performs the teardown choreography: clear
//! the running flag, deliver one poison pill per consumer, join, close.
//!
//! The ordering in `shutdown` is load-bearing: the flag is cleared before
//! the sentinels go out so a consumer woken by anything else also sees
//! termination, and the sentinels go out before the joins so a consumer
//! blocked in dequeue is guaranteed to wake.

mod reactor;
mod sender;
mod worker;

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info};

use relayd_wire::{CipherFn, CipherPair, StrategyCode, TargetTag};

use crate::config::ServerConfig;
use crate::net;
use crate::poll::Poller;
use crate::queue::BoundedQueue;
use crate::roster::Roster;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::task::{Destination, InboundTask, OutboundTask, PeerId};

/// Message callback invoked by the worker stage for every parsed frame.
///
/// The body borrow is valid only until the callback returns; copy it out
/// to retain it. With the default single worker, invocations are strictly
/// serialized.
pub type OnServerMessage = dyn Fn(&ServerHandle, PeerId, &TargetTag, &[u8]) + Send + Sync;

/// Server-side failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Submission refused because the server is not running.
    #[error("server is not running")]
    NotRunning,

    /// Submission refused because the outbound queue is full. The frame
    /// was not queued; the caller decides whether to retry or drop.
    #[error("outbound queue is full")]
    QueueFull,

    /// Socket or epoll failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// State shared by every stage and every handle of one server.
pub(crate) struct Shared {
    pub(crate) running: AtomicBool,
    pub(crate) roster: Roster,
    pub(crate) strategy: Mutex<CipherPair>,
    pub(crate) advertise: StrategyCode,
    pub(crate) frame_capacity: usize,
    pub(crate) stats: PipelineStats,
    pub(crate) outbound: BoundedQueue<OutboundTask>,
}

impl Shared {
    pub(crate) fn current_strategy(&self) -> CipherPair {
        *self.strategy.lock().expect("strategy mutex poisoned")
    }
}

/// An embeddable framed-message TCP server.
pub struct Server {
    shared: Arc<Shared>,
    inbound: BoundedQueue<InboundTask>,
    listener: TcpListener,
    poller: Poller,
    config: ServerConfig,
    handler: Arc<OnServerMessage>,
    workers: Vec<JoinHandle<()>>,
    sender: Option<JoinHandle<()>>,
}

impl Server {
    /// Validate the configuration, bind the listening socket, and prepare
    /// the pipeline. No threads run yet.
    pub fn bind<F>(config: ServerConfig, handler: F) -> Result<Server, ServerError>
    where
        F: Fn(&ServerHandle, PeerId, &TargetTag, &[u8]) + Send + Sync + 'static,
    {
        config.validate().map_err(ServerError::Config)?;

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|_| {
                ServerError::Config(format!("invalid bind address {}:{}", config.host, config.port))
            })?;

        let listener = net::bind_listener(addr, config.backlog)?;
        let poller = Poller::new()?;
        poller.register(listener.as_raw_fd(), false)?;

        let strategy_code = StrategyCode::from_wire(config.strategy_code);
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            roster: Roster::new(),
            strategy: Mutex::new(CipherPair::for_code(strategy_code)),
            advertise: strategy_code,
            frame_capacity: config.frame_capacity,
            stats: PipelineStats::default(),
            outbound: BoundedQueue::with_capacity(config.queue.outbound_capacity),
        });
        let inbound = BoundedQueue::with_capacity(config.queue.inbound_capacity);

        info!(
            addr = %listener.local_addr()?,
            strategy = ?strategy_code,
            workers = config.worker_count,
            "server bound"
        );

        Ok(Server {
            shared,
            inbound,
            listener,
            poller,
            config,
            handler: Arc::new(handler),
            workers: Vec::new(),
            sender: None,
        })
    }

    /// The bound address; useful when the configured port was zero.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A cloneable capability handle for submitting frames and reading
    /// state. Valid before, during, and after `run`; submissions are
    /// refused outside the running window.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the worker and sender stages and drive the reactor on the
    /// calling thread. Returns once `exit_flag` is set (observed within
    /// one poll timeout) or the running flag is cleared. Call
    /// [`Server::shutdown`] afterwards to complete teardown.
    pub fn run(&mut self, exit_flag: &AtomicBool) -> Result<(), ServerError> {
        self.shared.running.store(true, Ordering::SeqCst);

        for id in 0..self.config.worker_count {
            let shared = Arc::clone(&self.shared);
            let inbound = self.inbound.clone();
            let handler = Arc::clone(&self.handler);
            let thread = thread::Builder::new()
                .name(format!("relayd-worker-{id}"))
                .spawn(move || worker::run(shared, inbound, handler))?;
            self.workers.push(thread);
        }

        {
            let shared = Arc::clone(&self.shared);
            let thread = thread::Builder::new()
                .name("relayd-sender".to_string())
                .spawn(move || sender::run(shared))?;
            self.sender = Some(thread);
        }

        info!("server pipeline started");

        let mut reactor = reactor::Reactor::new(
            &self.shared,
            &self.inbound,
            &self.poller,
            &self.listener,
            self.config.max_events,
        );
        reactor.run(exit_flag, self.config.poll_timeout_ms)?;

        info!("reactor loop exited");
        Ok(())
    }

    /// Complete teardown: poison pills, joins, and descriptor cleanup.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);

        for _ in 0..self.workers.len() {
            self.inbound.enqueue_blocking(InboundTask::Shutdown);
        }
        if self.sender.is_some() {
            self.shared.outbound.enqueue_blocking(OutboundTask::Shutdown);
        }

        for thread in self.workers.drain(..) {
            if thread.join().is_err() {
                debug!("worker thread panicked before join");
            }
        }
        if let Some(thread) = self.sender.take() {
            if thread.join().is_err() {
                debug!("sender thread panicked before join");
            }
        }

        self.shared.roster.clear();
        info!("server shut down");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.workers.is_empty() || self.sender.is_some() {
            self.shutdown_inner();
        }
    }
}

/// Cloneable capability set over a running server.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Queue a frame for one peer. The body is copied at submission.
    pub fn send(&self, peer: PeerId, target: &TargetTag, body: &[u8]) -> Result<(), ServerError> {
        self.submit(OutboundTask::Frame {
            target: *target,
            body: body.to_vec(),
            dest: Destination::Unicast(peer),
        })
    }

    /// Queue a frame for every peer connected at the moment the sender
    /// performs the fan-out.
    pub fn broadcast(&self, target: &TargetTag, body: &[u8]) -> Result<(), ServerError> {
        self.submit(OutboundTask::Frame {
            target: *target,
            body: body.to_vec(),
            dest: Destination::Broadcast,
        })
    }

    fn submit(&self, task: OutboundTask) -> Result<(), ServerError> {
        if !self.is_running() {
            return Err(ServerError::NotRunning);
        }
        self.shared
            .outbound
            .try_enqueue(task)
            .map_err(|_| ServerError::QueueFull)
    }

    /// Swap the data-path cipher pair. Advisory mid-session: the peer must
    /// perform the matching swap at the same logical moment.
    pub fn set_strategy(&self, encrypt: Option<CipherFn>, decrypt: Option<CipherFn>) {
        *self.shared.strategy.lock().expect("strategy mutex poisoned") =
            CipherPair { encrypt, decrypt };
    }

    /// Number of currently connected peers.
    pub fn client_count(&self) -> usize {
        self.shared.roster.count()
    }

    /// Pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}
