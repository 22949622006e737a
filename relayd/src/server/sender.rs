//! Sender stage: serialize, encrypt, write.
//!
//! All socket writes happen on this one thread, which serializes
//! concurrent sends to the same peer without per-peer locks and lets one
//! reused buffer back every serialization.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, warn};

use relayd_wire::serialize_into;

use crate::net;
use crate::server::Shared;
use crate::task::{Destination, OutboundTask};

pub(crate) fn run(shared: Arc<Shared>) {
    let mut buf = BytesMut::with_capacity(shared.frame_capacity);

    while shared.running.load(Ordering::SeqCst) {
        match shared.outbound.dequeue() {
            OutboundTask::Frame { target, body, dest } => {
                let encrypt = shared.current_strategy().encrypt;
                if let Err(e) =
                    serialize_into(&mut buf, &target, &body, encrypt, shared.frame_capacity)
                {
                    shared.stats.record_send_failure();
                    warn!(%target, error = %e, "dropping unserializable outbound frame");
                    continue;
                }

                match dest {
                    Destination::Unicast(peer) => {
                        match shared.roster.with_peer(peer, |stream| net::write_frame(stream, &buf))
                        {
                            Some(Ok(())) => shared.stats.record_frame_out(),
                            Some(Err(e)) => {
                                // Removal stays on the reactor's read path.
                                shared.stats.record_send_failure();
                                warn!(%peer, error = %e, "unicast write failed");
                            }
                            None => debug!(%peer, "unicast target no longer connected"),
                        }
                    }
                    Destination::Broadcast => {
                        // Fenced fan-out: the roster lock is held for the
                        // whole iteration; a failing peer costs its own
                        // frame only.
                        shared.roster.for_each(|peer, stream| {
                            if let Err(e) = net::write_frame(stream, &buf) {
                                shared.stats.record_send_failure();
                                warn!(%peer, error = %e, "broadcast write failed");
                            }
                        });
                        shared.stats.record_frame_out();
                    }
                }
            }
            OutboundTask::Shutdown => break,
        }
    }

    debug!("sender exiting");
}
