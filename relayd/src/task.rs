//! Pipeline task types.
//!
//! Tasks own their byte buffers outright; whichever stage drops a task
//! frees its buffer, whether that happens after normal processing, on a
//! backpressure refusal, or while a queue is torn down with items still
//! inside.

use std::fmt;
use std::os::fd::RawFd;

use relayd_wire::TargetTag;

/// Opaque identity of a connected peer, stable from accept to disconnect.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub(crate) RawFd);

impl PeerId {
    pub(crate) fn raw(self) -> RawFd {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

/// Reactor → worker task.
#[derive(Debug, Clone)]
pub enum InboundTask {
    /// One raw read from a peer, to be parsed and dispatched.
    Frame { peer: PeerId, data: Vec<u8> },
    /// Poison pill; the worker that dequeues this exits.
    Shutdown,
}

/// Where an outbound frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A single connected peer.
    Unicast(PeerId),
    /// Every peer in the roster at send time.
    Broadcast,
}

/// Worker/application → sender task.
#[derive(Debug)]
pub enum OutboundTask {
    /// A frame to serialize and write. The body is a deep copy taken at
    /// submission time, so the submitter's buffer is never retained.
    Frame {
        target: TargetTag,
        body: Vec<u8>,
        dest: Destination,
    },
    /// Poison pill; the sender exits.
    Shutdown,
}
