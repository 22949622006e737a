//! Connected-peer roster.
//!
//! A mutex-guarded map from peer id to the write-side handle of that
//! peer's socket. Mutation happens at exactly two points, accept and
//! disconnect, both on the reactor thread; the sender iterates under the
//! lock for the whole duration of a broadcast so a concurrently removed
//! peer can never be written after its socket is gone.
//!
//! The roster lock is never held while enqueuing to a pipeline queue.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Mutex;

use crate::task::PeerId;

#[derive(Debug, Default)]
pub struct Roster {
    peers: Mutex<HashMap<PeerId, TcpStream>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly accepted peer.
    pub fn add(&self, peer: PeerId, stream: TcpStream) {
        let mut peers = self.peers.lock().expect("roster mutex poisoned");
        peers.insert(peer, stream);
    }

    /// Remove a peer, returning its write handle so the caller controls
    /// when the descriptor actually closes.
    pub fn remove(&self, peer: PeerId) -> Option<TcpStream> {
        let mut peers = self.peers.lock().expect("roster mutex poisoned");
        peers.remove(&peer)
    }

    /// Number of live peers.
    pub fn count(&self) -> usize {
        let peers = self.peers.lock().expect("roster mutex poisoned");
        peers.len()
    }

    /// Run `f` against one peer's stream, if it is still connected.
    pub fn with_peer<R>(&self, peer: PeerId, f: impl FnOnce(&TcpStream) -> R) -> Option<R> {
        let peers = self.peers.lock().expect("roster mutex poisoned");
        peers.get(&peer).map(f)
    }

    /// Fenced iteration for broadcast: `f` runs for every peer with the
    /// lock held throughout.
    pub fn for_each(&self, mut f: impl FnMut(PeerId, &TcpStream)) {
        let peers = self.peers.lock().expect("roster mutex poisoned");
        for (peer, stream) in peers.iter() {
            f(*peer, stream);
        }
    }

    /// Drop every remaining peer, closing the write handles. Used during
    /// teardown after the reactor has stopped.
    pub fn clear(&self) {
        let mut peers = self.peers.lock().expect("roster mutex poisoned");
        peers.clear();
    }
}
