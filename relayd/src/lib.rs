//! Embeddable threaded TCP server/client framework for framed message
//! exchange.
//!
//! The server side runs a three-stage pipeline on native OS threads:
//!
//! ```text
//! epoll reactor ──inbound queue──> worker ──outbound queue──> sender
//!   (accept, handshake,             (parse, decrypt,           (serialize, encrypt,
//!    per-peer reads)                 user handler)              unicast / broadcast)
//! ```
//!
//! Queues are bounded; producers never block (the reactor drops inbound
//! work when its queue is full, submitters get the frame back), consumers
//! block until work or a shutdown sentinel arrives. The client side runs a
//! single background manager thread that reconnects, performs the strategy
//! handshake, and dispatches received frames to a user callback.
//!
//! Frame format, checksum, and cipher strategies live in [`relayd_wire`].

pub mod client;
pub mod config;
pub mod net;
pub mod poll;
pub mod queue;
pub mod roster;
pub mod server;
pub mod stats;
pub mod task;

pub use client::{Client, ClientError, ClientHandle};
pub use config::{ClientConfig, QueueConfig, ServerConfig};
pub use queue::BoundedQueue;
pub use server::{Server, ServerError, ServerHandle};
pub use stats::{PipelineStats, StatsSnapshot};
pub use task::{Destination, InboundTask, OutboundTask, PeerId};
