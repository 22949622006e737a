//! Worker stage: parse, decrypt, dispatch.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use relayd_wire::parse;

use crate::queue::BoundedQueue;
use crate::server::{OnServerMessage, ServerHandle, Shared};
use crate::task::InboundTask;

/// Consumer loop: dequeue, parse with the current decrypt strategy, invoke
/// the user handler. A parse failure drops the frame and keeps the
/// connection; the task buffer is freed on drop either way.
pub(crate) fn run(
    shared: Arc<Shared>,
    inbound: BoundedQueue<InboundTask>,
    handler: Arc<OnServerMessage>,
) {
    let handle = ServerHandle {
        shared: Arc::clone(&shared),
    };

    while shared.running.load(Ordering::SeqCst) {
        match inbound.dequeue() {
            InboundTask::Frame { peer, mut data } => {
                let decrypt = shared.current_strategy().decrypt;
                match parse(&mut data, decrypt) {
                    Ok(frame) => {
                        shared.stats.record_frame_in();
                        handler(&handle, peer, &frame.target, frame.body);
                    }
                    Err(e) => {
                        shared.stats.record_parse_failure();
                        warn!(%peer, error = %e, "dropping unparseable frame");
                    }
                }
            }
            InboundTask::Shutdown => break,
        }
    }

    debug!("worker exiting");
}
